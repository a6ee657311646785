//! Nearest-neighbour search over song embeddings.

use std::fmt;

use cadenza_core::{Corpus, Error, Result};

/// Added to the distance spread so a set of equal distances never divides
/// by zero.
const SPREAD_EPSILON: f32 = 1e-6;

/// One nearest-neighbour hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the song in the corpus.
    pub position: usize,
    /// Squared L2 distance from the query (lower is closer).
    pub distance: f32,
}

/// The contract the ranking layer needs from a vector index.
///
/// Results are ordered by ascending distance and hold at most `k` entries.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    /// Dimension every stored vector and query must have.
    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the `k` stored vectors closest to `query`.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Exact index that scans every stored vector.
///
/// Suitable for the corpus sizes cadenza targets (tens of thousands of
/// songs); vectors are kept in one contiguous buffer.
#[derive(Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatIndex")
            .field("dimension", &self.dimension)
            .field("len", &self.len())
            .finish()
    }
}

impl FlatIndex {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Append one vector; its position is the current length.
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::InvalidData(format!(
                "vector has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Index every embedding of a corpus, in corpus order.
    pub fn from_corpus(corpus: &Corpus) -> Result<Self> {
        let mut index = Self::new(corpus.dimension());
        index.data.reserve(corpus.len() * corpus.dimension());
        for embedding in corpus.embeddings() {
            index.add(embedding)?;
        }
        Ok(index)
    }

    fn vector(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(Error::Retrieval(format!(
                "query vector has dimension {}, index has dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut neighbors: Vec<Neighbor> = (0..self.len())
            .map(|position| Neighbor {
                position,
                distance: squared_l2(self.vector(position), query),
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

/// Relative match percentages for an ascending list of distances.
///
/// The closest entry always gets 100; the farthest approaches 0.
pub fn distance_match_percents(distances: &[f32]) -> Vec<f32> {
    if distances.len() == 1 {
        return vec![100.0];
    }
    let min = distances.iter().copied().fold(f32::INFINITY, f32::min);
    let max = distances.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let spread = max - min + SPREAD_EPSILON;

    distances
        .iter()
        .map(|d| (100.0 * (1.0 - (d - min) / spread)).clamp(0.0, 100.0))
        .collect()
}
