//! The in-memory corpus: normalised songs and their embeddings.

use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Song, SongId};
use crate::sidecar::{IndexFile, IndexInfo, IndexedVector};

/// How a loaded index relates to the embedding model currently configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    /// Recorded model and dimension match the configuration.
    Compatible,
    /// Legacy index without recorded model info; the dimension matches.
    Unrecorded,
    /// The index was built with a different model or dimension. It is still
    /// usable, but query vectors may not be comparable to stored ones.
    Stale {
        recorded_model: Option<String>,
        recorded_dimension: usize,
    },
}

impl Compatibility {
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

/// Songs and their embedding vectors, aligned by position.
///
/// Immutable once built; the search crate derives its keyword and vector
/// indexes from it.
#[derive(Debug, Clone)]
pub struct Corpus {
    songs: Vec<Song>,
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
    info: Option<IndexInfo>,
}

impl Corpus {
    /// Build a corpus from already normalised parts.
    ///
    /// # Errors
    /// Returns [`Error::InvalidData`] when the lengths disagree or the
    /// embeddings do not share one dimension.
    pub fn from_parts(
        songs: Vec<Song>,
        embeddings: Vec<Vec<f32>>,
        info: Option<IndexInfo>,
    ) -> Result<Self> {
        if songs.len() != embeddings.len() {
            return Err(Error::InvalidData(format!(
                "{} songs but {} embeddings",
                songs.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings
            .first()
            .map(Vec::len)
            .or_else(|| info.as_ref().map(|i| i.dimension))
            .unwrap_or(0);

        if let Some(position) = embeddings.iter().position(|e| e.len() != dimension) {
            return Err(Error::InvalidData(format!(
                "embedding at position {position} has dimension {}, expected {dimension}",
                embeddings[position].len()
            )));
        }

        if let Some(info) = &info {
            if info.dimension != dimension && !embeddings.is_empty() {
                log::warn!(
                    "Index header records dimension {} but vectors have dimension {}",
                    info.dimension,
                    dimension
                );
            }
        }

        Ok(Self {
            songs,
            embeddings,
            dimension,
            info,
        })
    }

    /// Normalise every record of a parsed sidecar.
    pub fn from_index_file(file: IndexFile) -> Result<Self> {
        let mut songs = Vec::with_capacity(file.vectors.len());
        let mut embeddings = Vec::with_capacity(file.vectors.len());

        for (position, IndexedVector { id, embedding, metadata }) in
            file.vectors.into_iter().enumerate()
        {
            let metadata = if metadata.is_null() {
                Value::Object(serde_json::Map::new())
            } else {
                metadata
            };
            let mut song = Song::from_value(metadata, position)?;
            // The metadata id wins; the record-level id is the next best thing.
            if song.id == SongId::positional(position) {
                if let Some(record_id) = SongId::from_value(&id) {
                    song.id = record_id;
                }
            }
            songs.push(song);
            embeddings.push(embedding);
        }

        Self::from_parts(songs, embeddings, file.info)
    }

    /// Load a corpus from a sidecar file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let corpus = Self::from_index_file(IndexFile::load(path)?)?;
        log::info!(
            "Loaded corpus: {} songs, dimension {}",
            corpus.len(),
            corpus.dimension
        );
        Ok(corpus)
    }

    /// Convert back into sidecar form, e.g. after enrichment.
    pub fn to_index_file(&self) -> Result<IndexFile> {
        let vectors = self
            .songs
            .iter()
            .zip(&self.embeddings)
            .map(|(song, embedding)| {
                Ok(IndexedVector {
                    id: Value::String(song.id.to_string()),
                    embedding: embedding.clone(),
                    metadata: serde_json::to_value(song)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(IndexFile {
            info: self.info.clone(),
            vectors,
        })
    }

    /// Compare the recorded index header against the configured embedding
    /// model. A mismatch is logged as a warning, never treated as fatal.
    pub fn compatibility(&self, embed_model: &str, dimension: usize) -> Compatibility {
        let compatibility = match &self.info {
            Some(info) if info.embed_model == embed_model && info.dimension == dimension => {
                Compatibility::Compatible
            }
            Some(info) => Compatibility::Stale {
                recorded_model: Some(info.embed_model.clone()),
                recorded_dimension: info.dimension,
            },
            None if self.is_empty() || self.dimension == dimension => Compatibility::Unrecorded,
            None => Compatibility::Stale {
                recorded_model: None,
                recorded_dimension: self.dimension,
            },
        };

        if let Compatibility::Stale {
            recorded_model,
            recorded_dimension,
        } = &compatibility
        {
            log::warn!(
                "Index was built with {} (dimension {}), but {} (dimension {}) is configured; \
                 results may be unreliable until the index is rebuilt",
                recorded_model.as_deref().unwrap_or("an unrecorded model"),
                recorded_dimension,
                embed_model,
                dimension
            );
        }

        compatibility
    }

    /// Replace the songs while keeping embeddings, e.g. after enrichment.
    pub fn with_songs(mut self, songs: Vec<Song>) -> Result<Self> {
        if songs.len() != self.songs.len() {
            return Err(Error::InvalidData(format!(
                "expected {} songs, got {}",
                self.songs.len(),
                songs.len()
            )));
        }
        self.songs = songs;
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    #[must_use]
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    #[must_use]
    pub fn song(&self, position: usize) -> Option<&Song> {
        self.songs.get(position)
    }

    #[must_use]
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn info(&self) -> Option<&IndexInfo> {
        self.info.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn described(model: &str, dimension: usize) -> IndexFile {
        IndexFile {
            info: Some(IndexInfo {
                embed_model: model.to_string(),
                dimension,
            }),
            vectors: vec![
                IndexedVector {
                    id: json!(10),
                    embedding: vec![0.0, 1.0],
                    metadata: json!({"title": "A"}),
                },
                IndexedVector {
                    id: json!(11),
                    embedding: vec![1.0, 0.0],
                    metadata: json!({"id": "meta-b", "title": "B"}),
                },
            ],
        }
    }

    #[test]
    fn test_from_index_file_prefers_metadata_id() {
        let corpus = Corpus::from_index_file(described("m", 2)).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.songs()[0].id, SongId::new("10"));
        assert_eq!(corpus.songs()[1].id, SongId::new("meta-b"));
        assert_eq!(corpus.dimension(), 2);
    }

    #[test]
    fn test_from_parts_rejects_ragged_embeddings() {
        let songs = vec![Song::new(SongId::new("a"), "A"), Song::new(SongId::new("b"), "B")];
        let result = Corpus::from_parts(songs, vec![vec![0.0, 1.0], vec![0.0]], None);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_from_parts_rejects_length_mismatch() {
        let songs = vec![Song::new(SongId::new("a"), "A")];
        let result = Corpus::from_parts(songs, vec![], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_compatibility_matches() {
        let corpus = Corpus::from_index_file(described("text-embedding-004", 2)).unwrap();
        assert_eq!(
            corpus.compatibility("text-embedding-004", 2),
            Compatibility::Compatible
        );
    }

    #[test]
    fn test_compatibility_flags_model_change_without_failing() {
        let corpus = Corpus::from_index_file(described("text-embedding-3-large", 2)).unwrap();
        let compat = corpus.compatibility("text-embedding-004", 768);
        assert!(compat.is_stale());
        // Still searchable.
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn test_compatibility_legacy_index() {
        let mut file = described("ignored", 2);
        file.info = None;
        let corpus = Corpus::from_index_file(file).unwrap();
        assert_eq!(corpus.compatibility("any", 2), Compatibility::Unrecorded);
        assert!(corpus.compatibility("any", 3).is_stale());
    }

    #[test]
    fn test_load_and_write_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("songs_metadata.json");
        described("m", 2).save(&path).unwrap();

        let corpus = Corpus::load(&path).unwrap();
        let file = corpus.to_index_file().unwrap();
        assert_eq!(file.vectors.len(), 2);
        assert_eq!(file.vectors[1].metadata["title"], "B");
        assert_eq!(file.info.unwrap().embed_model, "m");
    }

    #[test]
    fn test_with_songs_requires_same_length() {
        let corpus = Corpus::from_index_file(described("m", 2)).unwrap();
        assert!(corpus.clone().with_songs(vec![]).is_err());
        let songs = corpus.songs().to_vec();
        assert!(corpus.with_songs(songs).is_ok());
    }
}
