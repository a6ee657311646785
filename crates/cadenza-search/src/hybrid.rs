//! Hybrid ranking: semantic neighbours fused with keyword hits.
//!
//! Both result sets are pulled wider than the requested `k` so that a song
//! matching the query's exact vocabulary is not lost to a narrow semantic
//! cut. Each score column is normalised by its maximum over the union, the
//! columns are combined with caller-supplied weights, and songs with any
//! keyword match receive a fixed thematic bonus.

use serde::{Deserialize, Serialize};

use cadenza_core::Result;

use crate::keyword::{KeywordHit, KeywordIndex};
use crate::vector::{Neighbor, VectorIndex};

/// Minimum semantic pool size; the pool is `max(2k, SEMANTIC_POOL_MIN)`.
pub const SEMANTIC_POOL_MIN: usize = 30;

/// Number of keyword hits pulled before fusion.
pub const KEYWORD_POOL: usize = 80;

/// Added (scaled by the normalised keyword score) to every song with a
/// keyword match.
pub const THEMATIC_BONUS: f32 = 0.2;

/// Relative weights of the semantic and keyword columns.
///
/// The weights need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

impl HybridWeights {
    #[must_use]
    pub const fn new(semantic: f32, keyword: f32) -> Self {
        Self { semantic, keyword }
    }
}

/// One song of the fused ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub position: usize,
    /// Raw distance, when the song was in the semantic pool.
    pub distance: Option<f32>,
    /// Raw keyword score, when the song was in the keyword pool.
    pub keyword_score: Option<f32>,
    pub semantic_norm: f32,
    pub keyword_norm: f32,
    /// Fused score, capped at 1.0.
    pub final_score: f32,
    /// Relative to the top candidate of this ranking.
    pub match_percent: f32,
}

/// Size of the semantic pool for a request of `k` results.
#[must_use]
pub fn semantic_pool_size(k: usize) -> usize {
    k.saturating_mul(2).max(SEMANTIC_POOL_MIN)
}

fn normalize(column: &mut [f32]) {
    let max = column.iter().copied().fold(0.0_f32, f32::max);
    if max > 0.0 {
        for value in column.iter_mut() {
            *value /= max;
        }
    }
}

/// Fuse a semantic and a keyword result set into the top `k` candidates.
///
/// Union order is semantic order first, then keyword-only songs in keyword
/// order; ties in the final score keep that order.
pub fn fuse(
    semantic: &[Neighbor],
    keyword: &[KeywordHit],
    k: usize,
    weights: HybridWeights,
) -> Vec<FusedCandidate> {
    let mut candidates: Vec<FusedCandidate> = Vec::with_capacity(semantic.len() + keyword.len());

    for neighbor in semantic {
        if candidates.iter().any(|c| c.position == neighbor.position) {
            continue;
        }
        candidates.push(FusedCandidate {
            position: neighbor.position,
            distance: Some(neighbor.distance),
            keyword_score: None,
            semantic_norm: 0.0,
            keyword_norm: 0.0,
            final_score: 0.0,
            match_percent: 0.0,
        });
    }
    for hit in keyword {
        match candidates.iter_mut().find(|c| c.position == hit.position) {
            Some(existing) => existing.keyword_score = Some(hit.score),
            None => candidates.push(FusedCandidate {
                position: hit.position,
                distance: None,
                keyword_score: Some(hit.score),
                semantic_norm: 0.0,
                keyword_norm: 0.0,
                final_score: 0.0,
                match_percent: 0.0,
            }),
        }
    }

    let mut semantic_column: Vec<f32> = candidates
        .iter()
        .map(|c| c.distance.map_or(0.0, |d| 1.0 / (1.0 + d)))
        .collect();
    let mut keyword_column: Vec<f32> = candidates
        .iter()
        .map(|c| c.keyword_score.unwrap_or(0.0))
        .collect();
    normalize(&mut semantic_column);
    normalize(&mut keyword_column);

    for ((candidate, semantic_norm), keyword_norm) in
        candidates.iter_mut().zip(semantic_column).zip(keyword_column)
    {
        let bonus = if keyword_norm > 0.0 {
            THEMATIC_BONUS * keyword_norm
        } else {
            0.0
        };
        candidate.semantic_norm = semantic_norm;
        candidate.keyword_norm = keyword_norm;
        candidate.final_score =
            weights.semantic * semantic_norm + weights.keyword * keyword_norm + bonus;
    }

    candidates.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    candidates.truncate(k);
    for candidate in &mut candidates {
        candidate.final_score = candidate.final_score.min(1.0);
    }

    let top = candidates.first().map_or(0.0, |c| c.final_score);
    for candidate in &mut candidates {
        candidate.match_percent = if top > 0.0 {
            (candidate.final_score / top * 100.0).clamp(0.0, 100.0)
        } else {
            // Every candidate ties with the top one.
            100.0
        };
    }

    candidates
}

/// Ranks songs by pulling both pools and fusing them.
#[derive(Debug, Clone, Copy)]
pub struct HybridRanker<'a> {
    vectors: &'a dyn VectorIndex,
    keywords: &'a KeywordIndex,
}

impl<'a> HybridRanker<'a> {
    #[must_use]
    pub fn new(vectors: &'a dyn VectorIndex, keywords: &'a KeywordIndex) -> Self {
        Self { vectors, keywords }
    }

    /// Rank songs for a query given as both text and embedding.
    ///
    /// # Errors
    /// Returns [`cadenza_core::Error::Retrieval`] when the vector index
    /// cannot answer.
    pub fn rank(
        &self,
        query: &str,
        query_vector: &[f32],
        k: usize,
        weights: HybridWeights,
    ) -> Result<Vec<FusedCandidate>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let semantic = self.vectors.search(query_vector, semantic_pool_size(k))?;
        let keyword = self.keywords.score(query, KEYWORD_POOL);
        log::debug!(
            "Fusing {} semantic and {} keyword candidates for {:?}",
            semantic.len(),
            keyword.len(),
            query
        );
        Ok(fuse(&semantic, &keyword, k, weights))
    }
}
