use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable identifier for a song.
///
/// Source records carry ids as either strings or numbers; both are kept in
/// their textual form. Records without an id fall back to their position in
/// the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(String);

impl SongId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id derived from a record's position in the corpus.
    #[must_use]
    pub fn positional(position: usize) -> Self {
        Self(position.to_string())
    }

    /// Read an id from a loosely typed JSON value.
    ///
    /// Strings and numbers are accepted; anything else (including empty
    /// strings and `null`) yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SongId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
