//! Core data model for cadenza.
//!
//! This crate defines the typed song record, per-query search results,
//! the persisted index sidecar format, and the in-memory corpus that the
//! search and selection crates read from.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod corpus;
pub mod error;
pub mod model;
pub mod sidecar;

pub use corpus::{Compatibility, Corpus};
pub use error::{Error, Result};
pub use model::{SearchResult, Song, SongId};
pub use sidecar::{IndexFile, IndexInfo, IndexedVector};
