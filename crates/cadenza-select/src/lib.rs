//! Song selection for cadenza.
//!
//! Drives a remote generative model through an ordered list of fallback
//! models, classifying failures and retrying with backoff, and uses it to
//! pick the best of the hybrid search candidates for a query.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod enrich;
pub mod error;
pub mod finder;
pub mod gemini;
pub mod invoke;
pub mod parse;
pub mod prompt;
pub mod provider;

pub use config::Config;
pub use enrich::{EnrichSummary, Enrichment, SongEnricher};
pub use error::{CallFailure, EmbedError, InvokeError, SelectError, SelectResult};
pub use finder::{FinderOptions, IndexStatus, SelectionReport, SelectionStatus, SongFinder};
pub use gemini::GeminiClient;
pub use invoke::{BackoffPolicy, FailureClass, Invocation, ModelAttempt, ModelInvoker};
pub use parse::{Selection, SelectionParser, SelectionSource};
pub use provider::{Embedder, GenerationOptions, GenerationRequest, GenerativeModel};
