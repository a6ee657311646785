use serde::{Deserialize, Serialize};

use crate::model::song::Song;

/// A song annotated with the scores of one query.
///
/// Created fresh for every query and never shared between queries.
/// `match_percent` is relative to the best result of the same result set,
/// not an absolute relevance measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Position of the song in the corpus.
    pub position: usize,

    #[serde(flatten)]
    pub song: Song,

    /// Raw squared L2 distance from the query vector (lower is closer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_distance: Option<f32>,

    /// Lexical overlap score in 0.0..=1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,

    /// Fused semantic + keyword score in 0.0..=1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hybrid_score: Option<f32>,

    /// 0.0..=100.0, where the best result of the set is always 100.
    pub match_percent: f32,
}

impl SearchResult {
    #[must_use]
    pub fn new(position: usize, song: Song) -> Self {
        Self {
            position,
            song,
            similarity_distance: None,
            keyword_score: None,
            hybrid_score: None,
            match_percent: 0.0,
        }
    }

    #[must_use]
    pub fn with_distance(mut self, distance: f32) -> Self {
        self.similarity_distance = Some(distance);
        self
    }

    #[must_use]
    pub fn with_keyword_score(mut self, score: f32) -> Self {
        self.keyword_score = Some(score);
        self
    }

    #[must_use]
    pub fn with_hybrid_score(mut self, score: f32) -> Self {
        self.hybrid_score = Some(score);
        self
    }
}
