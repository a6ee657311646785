//! Metadata filters applied on top of semantic search.

use serde::{Deserialize, Serialize};

use cadenza_core::Song;

/// Restricts results by language, mood and artist.
///
/// Empty criteria match everything. A song passes the mood criterion when
/// it carries at least one of the requested moods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub moods: Vec<String>,
    #[serde(default)]
    pub artist: Option<String>,
}

impl SearchFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.moods.is_empty() && self.artist.is_none()
    }

    #[must_use]
    pub fn matches(&self, song: &Song) -> bool {
        if let Some(language) = &self.language {
            if song.language.as_deref() != Some(language.as_str()) {
                return false;
            }
        }

        if !self.moods.is_empty()
            && !self
                .moods
                .iter()
                .any(|wanted| song.mood.iter().any(|m| m.to_lowercase() == wanted.to_lowercase()))
        {
            return false;
        }

        if let Some(artist) = &self.artist {
            let matches_artist = song
                .artist
                .as_deref()
                .is_some_and(|a| a.to_lowercase() == artist.to_lowercase());
            if !matches_artist {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::SongId;

    fn song() -> Song {
        Song::new(SongId::new("1"), "Звезда")
            .with_artist("Кино")
            .with_mood(["calm", "reflective"])
            .with_language("ru")
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = SearchFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&song()));
    }

    #[test]
    fn test_language_filter() {
        let filter = SearchFilter {
            language: Some("en".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&song()));
    }

    #[test]
    fn test_mood_filter_any_of() {
        let filter = SearchFilter {
            moods: vec!["energetic".to_string(), "Calm".to_string()],
            ..Default::default()
        };
        assert!(filter.matches(&song()));
    }

    #[test]
    fn test_artist_filter_is_case_insensitive() {
        let filter = SearchFilter {
            artist: Some("КИНО".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&song()));

        let other = SearchFilter {
            artist: Some("Аквариум".to_string()),
            ..Default::default()
        };
        assert!(!other.matches(&song()));
    }
}
