//! Search for cadenza.
//!
//! Fuses nearest-neighbour search over song embeddings with a lexical
//! keyword score into one ranked candidate list.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod cache;
pub mod filter;
pub mod hybrid;
pub mod index;
pub mod keyword;
pub mod vector;

pub use cache::{query_key, FifoCache};
pub use filter::SearchFilter;
pub use hybrid::{FusedCandidate, HybridRanker, HybridWeights};
pub use index::SongIndex;
pub use keyword::{KeywordHit, KeywordIndex};
pub use vector::{FlatIndex, Neighbor, VectorIndex};
