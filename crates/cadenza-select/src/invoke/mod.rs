//! Resilient invocation of a remote generative model.

pub mod backoff;
pub mod classify;
pub mod invoker;

pub use backoff::BackoffPolicy;
pub use classify::FailureClass;
pub use invoker::{
    AttemptOutcome, Invocation, ModelAttempt, ModelInvoker, DEFAULT_FALLBACK_MODELS,
    DEFAULT_PRIMARY_MODEL, DEFAULT_RETRY_SWEEPS,
};
