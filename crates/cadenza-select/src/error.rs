//! Error types for model invocation and song selection.

use thiserror::Error;

use crate::invoke::FailureClass;

/// A single failed call to a provider, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    /// The provider answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl CallFailure {
    #[must_use]
    pub fn class(&self) -> FailureClass {
        FailureClass::classify(self)
    }
}

/// Errors surfaced by [`crate::ModelInvoker`] once its fallback and retry
/// budget is spent.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The invoker was built without any model identifiers.
    #[error("no models configured")]
    NoModels,

    /// Every candidate model reported an exhausted quota.
    #[error("quota exceeded for every model: {}", .models.join(", "))]
    QuotaExhausted { models: Vec<String> },

    /// A failure expected to recur for every model (auth, bad request).
    #[error("{model} failed with HTTP {status}: {message}")]
    Fatal {
        model: String,
        status: u16,
        message: String,
    },

    /// Transient failures persisted through every retry and sweep.
    #[error("all models failed ({}); last error: {last}", .models.join(", "))]
    Exhausted { models: Vec<String>, last: String },
}

impl InvokeError {
    /// Returns `true` when the call gave up on transient failures and may
    /// succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns `true` when retrying the call is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. } | Self::Fatal { .. })
    }
}

/// Errors from the embedding provider.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Call(#[from] CallFailure),

    /// A 2xx response that did not carry an embedding.
    #[error("unexpected embedding response: {0}")]
    Parse(String),

    #[error("embedding has dimension {actual}, index expects {expected}")]
    Dimension { expected: usize, actual: usize },
}

impl EmbedError {
    /// Returns `true` when the request may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Call(failure) => failure.class().is_retryable(),
            Self::Parse(_) | Self::Dimension { .. } => false,
        }
    }
}

/// Errors from the search-and-select pipeline.
#[derive(Debug, Error)]
pub enum SelectError {
    /// Input, retrieval or data errors from the index.
    #[error(transparent)]
    Core(#[from] cadenza_core::Error),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error("model invocation failed: {0}")]
    Invoke(#[from] InvokeError),

    /// A 2xx model response that could not be used.
    #[error("unexpected model response: {0}")]
    Response(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A batch task panicked or was cancelled.
    #[error("batch task failed: {0}")]
    Task(String),
}

impl SelectError {
    /// Returns `true` for caller mistakes such as an empty query.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_input())
    }
}

/// Convenience alias for pipeline results.
pub type SelectResult<T> = std::result::Result<T, SelectError>;
