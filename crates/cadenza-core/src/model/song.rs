use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::ids::SongId;

/// A field that source data stores either as one string or as a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<Value>),
}

impl TextOrList {
    /// Flatten into individual non-empty strings. Non-string list members
    /// are rendered with their JSON text.
    fn into_items(self) -> Vec<String> {
        let items: Vec<String> = match self {
            Self::Text(s) => vec![s],
            Self::List(values) => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Song record exactly as it appears in source JSON.
#[derive(Debug, Deserialize)]
struct RawSong {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    lyrics: Option<TextOrList>,
    #[serde(default)]
    themes: Option<TextOrList>,
    #[serde(default)]
    mood: Option<TextOrList>,
    #[serde(default)]
    language: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// One indexed song.
///
/// Loosely shaped source fields are normalised once, at ingestion:
/// multi-line lyrics stored as a list are joined with newlines, and
/// themes/mood stored as a single string become one-element lists.
/// Fields the core never inspects are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mood: Vec<String>,

    /// Language code such as "ru" or "en".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Song {
    /// Create an otherwise empty song with the given id and title.
    #[must_use]
    pub fn new(id: SongId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: Some(title.into()),
            artist: None,
            lyrics: None,
            themes: Vec::new(),
            mood: Vec::new(),
            language: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    #[must_use]
    pub fn with_lyrics(mut self, lyrics: impl Into<String>) -> Self {
        self.lyrics = Some(lyrics.into());
        self
    }

    #[must_use]
    pub fn with_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.themes = themes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_mood<I, S>(mut self, mood: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mood = mood.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Normalise a loosely typed JSON record.
    ///
    /// `position` is the record's index in the corpus and becomes the id
    /// when the record carries none of its own.
    pub fn from_value(value: Value, position: usize) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::InvalidData(format!(
                "song record at position {position} is not a JSON object"
            )));
        }
        let raw: RawSong = serde_json::from_value(value)?;
        Ok(Self::from_raw(raw, position))
    }

    fn from_raw(raw: RawSong, position: usize) -> Self {
        let id = raw
            .id
            .as_ref()
            .and_then(SongId::from_value)
            .unwrap_or_else(|| SongId::positional(position));

        let lyrics = raw
            .lyrics
            .map(|l| match l {
                TextOrList::Text(s) => s,
                list @ TextOrList::List(_) => list.into_items().join("\n"),
            })
            .filter(|l| !l.trim().is_empty());

        Self {
            id,
            title: raw.title.filter(|t| !t.trim().is_empty()),
            artist: raw.artist.filter(|a| !a.trim().is_empty()),
            lyrics,
            themes: raw.themes.map(TextOrList::into_items).unwrap_or_default(),
            mood: raw.mood.map(TextOrList::into_items).unwrap_or_default(),
            language: raw.language,
            extra: raw.extra,
        }
    }

    /// Title for display, with a placeholder for untitled records.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    /// All text the keyword index looks at: title, lyrics, themes and mood.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(title) = &self.title {
            parts.push(title);
        }
        if let Some(lyrics) = &self.lyrics {
            parts.push(lyrics);
        }
        parts.extend(self.themes.iter().map(String::as_str));
        parts.extend(self.mood.iter().map(String::as_str));
        parts.join(" ")
    }

    /// Whether both themes and mood are already present.
    #[must_use]
    pub fn is_enriched(&self) -> bool {
        !self.themes.is_empty() && !self.mood.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_joins_lyric_lines() {
        let song = Song::from_value(
            json!({
                "id": "s-1",
                "title": "Листопад",
                "lyrics": ["Осень пришла", "Листья кружат"],
            }),
            0,
        )
        .unwrap();

        assert_eq!(song.id, SongId::new("s-1"));
        assert_eq!(song.lyrics.as_deref(), Some("Осень пришла\nЛистья кружат"));
    }

    #[test]
    fn test_from_value_single_string_mood_becomes_list() {
        let song = Song::from_value(json!({"title": "A", "mood": "calm"}), 3).unwrap();
        assert_eq!(song.mood, vec!["calm"]);
        assert!(song.themes.is_empty());
    }

    #[test]
    fn test_from_value_defaults_id_to_position() {
        let song = Song::from_value(json!({"title": "No id"}), 12).unwrap();
        assert_eq!(song.id, SongId::positional(12));
    }

    #[test]
    fn test_from_value_keeps_unknown_fields() {
        let song = Song::from_value(
            json!({"title": "A", "albumId": "63e65c7471da173056c1c595"}),
            0,
        )
        .unwrap();
        assert_eq!(song.extra["albumId"], "63e65c7471da173056c1c595");
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let result = Song::from_value(json!(["not", "a", "song"]), 0);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_searchable_text_includes_all_fields() {
        let song = Song::new(SongId::new("1"), "Autumn")
            .with_lyrics("falling leaves")
            .with_themes(["nature"])
            .with_mood(["wistful"]);
        assert_eq!(song.searchable_text(), "Autumn falling leaves nature wistful");
    }

    #[test]
    fn test_serialize_round_trips_extra_fields() {
        let song = Song::from_value(json!({"id": 5, "title": "A", "year": 1999}), 0).unwrap();
        let value = serde_json::to_value(&song).unwrap();
        assert_eq!(value["id"], "5");
        assert_eq!(value["year"], 1999);
        assert!(value.get("themes").is_none());
    }

    #[test]
    fn test_is_enriched() {
        let song = Song::new(SongId::new("1"), "A").with_themes(["love"]);
        assert!(!song.is_enriched());
        assert!(song.with_mood(["tender"]).is_enriched());
    }
}
