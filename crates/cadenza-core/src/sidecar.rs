//! Persisted index sidecar.
//!
//! The sidecar is a JSON document stored next to the vector index. Two
//! shapes exist and both must be readable:
//!
//! - legacy: a bare list of `{id, embedding, metadata}` records;
//! - described: `{"_index_info": {embed_model, dimension}, "vectors": [...]}`
//!   with the same per-record shape.
//!
//! A file is written in the described shape when it carries index info,
//! and as a legacy list otherwise.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Embedding model and dimension recorded when the index was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub embed_model: String,
    pub dimension: usize,
}

/// One persisted record: id, embedding and raw song metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    #[serde(default)]
    pub id: Value,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SidecarDocument {
    Described {
        #[serde(rename = "_index_info")]
        index_info: IndexInfo,
        vectors: Vec<IndexedVector>,
    },
    Legacy(Vec<IndexedVector>),
}

#[derive(Debug, Serialize)]
struct DescribedRef<'a> {
    #[serde(rename = "_index_info")]
    index_info: &'a IndexInfo,
    vectors: &'a [IndexedVector],
}

/// Parsed contents of a sidecar file.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexFile {
    /// `None` for legacy files, which never recorded the embedding model.
    pub info: Option<IndexInfo>,
    pub vectors: Vec<IndexedVector>,
}

impl IndexFile {
    /// Parse a sidecar document in either shape.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: SidecarDocument = serde_json::from_str(json)?;
        Ok(match document {
            SidecarDocument::Described {
                index_info,
                vectors,
            } => Self {
                info: Some(index_info),
                vectors,
            },
            SidecarDocument::Legacy(vectors) => Self {
                info: None,
                vectors,
            },
        })
    }

    /// Read and parse a sidecar file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Reading index sidecar {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serialize in the described shape. Files without recorded info are
    /// written back in the legacy shape so no information is invented.
    pub fn to_json(&self) -> Result<String> {
        let json = match &self.info {
            Some(info) => serde_json::to_string_pretty(&DescribedRef {
                index_info: info,
                vectors: &self.vectors,
            })?,
            None => serde_json::to_string_pretty(&self.vectors)?,
        };
        Ok(json)
    }

    /// Write the sidecar to disk, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        log::info!(
            "Wrote {} vectors to {}",
            self.vectors.len(),
            path.display()
        );
        Ok(())
    }
}
