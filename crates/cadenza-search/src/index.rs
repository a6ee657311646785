//! Corpus plus the indexes derived from it.

use cadenza_core::{Corpus, Error, Result, SearchResult};

use crate::filter::SearchFilter;
use crate::hybrid::{HybridRanker, HybridWeights};
use crate::keyword::KeywordIndex;
use crate::vector::{distance_match_percents, FlatIndex, Neighbor, VectorIndex};

/// Semantic pool multiplier used when filters will discard candidates.
const FILTER_POOL_FACTOR: usize = 3;

/// A loaded corpus together with its vector and keyword indexes.
///
/// Read-only after construction, so it can be shared between concurrent
/// queries behind an `Arc`.
#[derive(Debug)]
pub struct SongIndex {
    corpus: Corpus,
    vectors: Box<dyn VectorIndex>,
    keywords: KeywordIndex,
}

impl SongIndex {
    /// Index a corpus with the exact in-process vector index.
    pub fn build(corpus: Corpus) -> Result<Self> {
        let vectors = FlatIndex::from_corpus(&corpus)?;
        Self::with_vector_index(corpus, Box::new(vectors))
    }

    /// Index a corpus with an externally built vector index. The index must
    /// hold one vector per song, in corpus order.
    pub fn with_vector_index(corpus: Corpus, vectors: Box<dyn VectorIndex>) -> Result<Self> {
        if vectors.len() != corpus.len() {
            return Err(Error::InvalidData(format!(
                "vector index holds {} vectors for {} songs",
                vectors.len(),
                corpus.len()
            )));
        }
        let keywords = KeywordIndex::build(corpus.songs());
        log::debug!(
            "Indexed {} songs (dimension {})",
            corpus.len(),
            vectors.dimension()
        );
        Ok(Self {
            corpus,
            vectors,
            keywords,
        })
    }

    #[must_use]
    pub const fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.corpus.is_empty() {
            return Err(Error::Input("the song index is empty".to_string()));
        }
        Ok(())
    }

    fn results_from_neighbors(&self, neighbors: &[Neighbor]) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = neighbors
            .iter()
            .filter_map(|n| {
                self.corpus
                    .song(n.position)
                    .map(|song| SearchResult::new(n.position, song.clone()).with_distance(n.distance))
            })
            .collect();
        apply_distance_percents(&mut results);
        results
    }

    /// Plain nearest-neighbour search.
    pub fn semantic_search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.ensure_loaded()?;
        let neighbors = self.vectors.search(query_vector, k)?;
        Ok(self.results_from_neighbors(&neighbors))
    }

    /// Keyword-only search; `match_percent` is relative to the best score.
    pub fn keyword_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.ensure_loaded()?;
        let hits = self.keywords.score(query, k);
        let top = hits.first().map_or(0.0, |h| h.score);
        Ok(hits
            .iter()
            .filter_map(|hit| {
                self.corpus.song(hit.position).map(|song| {
                    let mut result =
                        SearchResult::new(hit.position, song.clone()).with_keyword_score(hit.score);
                    result.match_percent = if top > 0.0 { hit.score / top * 100.0 } else { 0.0 };
                    result
                })
            })
            .collect())
    }

    /// Fused semantic + keyword ranking of the top `k` songs.
    pub fn hybrid_search(
        &self,
        query: &str,
        query_vector: &[f32],
        k: usize,
        weights: HybridWeights,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_loaded()?;
        let ranker = HybridRanker::new(self.vectors.as_ref(), &self.keywords);
        let fused = ranker.rank(query, query_vector, k, weights)?;

        Ok(fused
            .into_iter()
            .filter_map(|candidate| {
                let song = self.corpus.song(candidate.position)?.clone();
                let mut result = SearchResult::new(candidate.position, song)
                    .with_hybrid_score(candidate.final_score);
                result.similarity_distance = candidate.distance;
                result.keyword_score = candidate.keyword_score;
                result.match_percent = candidate.match_percent;
                Some(result)
            })
            .collect())
    }

    /// Semantic search restricted by metadata filters.
    ///
    /// Pulls `3k` neighbours, keeps those passing the filter, and stops at
    /// `k`. Match percentages are recomputed over the filtered set.
    pub fn filtered_search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        if filter.is_empty() {
            return self.semantic_search(query_vector, k);
        }
        self.ensure_loaded()?;
        let neighbors = self.vectors.search(query_vector, k.saturating_mul(FILTER_POOL_FACTOR))?;

        let mut results: Vec<SearchResult> = neighbors
            .iter()
            .filter_map(|n| {
                let song = self.corpus.song(n.position)?;
                filter
                    .matches(song)
                    .then(|| SearchResult::new(n.position, song.clone()).with_distance(n.distance))
            })
            .take(k)
            .collect();
        apply_distance_percents(&mut results);
        Ok(results)
    }
}

fn apply_distance_percents(results: &mut [SearchResult]) {
    let distances: Vec<f32> = results
        .iter()
        .map(|r| r.similarity_distance.unwrap_or(0.0))
        .collect();
    for (result, percent) in results.iter_mut().zip(distance_match_percents(&distances)) {
        result.match_percent = percent;
    }
}
