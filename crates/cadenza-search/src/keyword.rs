//! Lexical keyword scoring.
//!
//! Every song is reduced once to a bag of lowercase tokens drawn from its
//! title, lyrics, themes and mood. A query is scored against each bag by
//! how many of its distinct terms appear (coverage) and how often they
//! repeat (density).

use std::collections::HashMap;

use cadenza_core::Song;

/// Tokens of this many characters or fewer are discarded.
const MAX_DISCARDED_TOKEN_CHARS: usize = 2;

const COVERAGE_WEIGHT: f32 = 0.7;
const DENSITY_WEIGHT: f32 = 0.3;

/// Lowercase, strip punctuation, split on whitespace and drop short tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > MAX_DISCARDED_TOKEN_CHARS)
        .map(String::from)
        .collect()
}

/// Distinct tokens in first-seen order.
fn distinct(tokens: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}

/// A song that shares at least one term with the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordHit {
    /// Position of the song in the corpus.
    pub position: usize,
    /// 0.0..=1.0.
    pub score: f32,
}

/// Per-song token bags, indexed by corpus position.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    bags: Vec<HashMap<String, u32>>,
}

impl KeywordIndex {
    /// Build the index from songs in corpus order.
    pub fn build(songs: &[Song]) -> Self {
        let bags = songs
            .iter()
            .map(|song| {
                let mut bag = HashMap::new();
                for token in tokenize(&song.searchable_text()) {
                    *bag.entry(token).or_insert(0) += 1;
                }
                bag
            })
            .collect();
        Self { bags }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    /// Score every song against `query` and return the best `k`.
    ///
    /// Songs with no matching term are left out. Equal scores keep corpus
    /// order.
    pub fn score(&self, query: &str, k: usize) -> Vec<KeywordHit> {
        let terms = distinct(tokenize(query));
        if terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<KeywordHit> = self
            .bags
            .iter()
            .enumerate()
            .filter_map(|(position, bag)| {
                Self::score_bag(bag, &terms).map(|score| KeywordHit { position, score })
            })
            .collect();

        // `sort_by` is stable, so ties stay in corpus order.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }

    fn score_bag(bag: &HashMap<String, u32>, terms: &[String]) -> Option<f32> {
        let mut matched = 0usize;
        let mut occurrences = 0u32;
        for term in terms {
            if let Some(count) = bag.get(term) {
                matched += 1;
                occurrences += count;
            }
        }
        if matched == 0 {
            return None;
        }

        let n = terms.len() as f32;
        let coverage = matched as f32 / n;
        let density = (occurrences as f32 / (2.0 * n)).min(1.0);
        Some(COVERAGE_WEIGHT * coverage + DENSITY_WEIGHT * density)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::SongId;

    fn song(id: &str, lyrics: &str) -> Song {
        Song::new(SongId::new(id), id).with_lyrics(lyrics)
    }

    #[test]
    fn test_tokenize_strips_punctuation_and_short_tokens() {
        let tokens = tokenize("Oh, the Autumn-leaves! Are we in it?");
        assert_eq!(tokens, vec!["the", "autumnleaves", "are"]);
    }

    #[test]
    fn test_tokenize_counts_characters_not_bytes() {
        // Two Cyrillic letters are four bytes but still too short.
        let tokens = tokenize("Ты и осень");
        assert_eq!(tokens, vec!["осень"]);
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = KeywordIndex::build(&[song("a", "autumn leaves")]);
        assert!(index.score("", 10).is_empty());
        assert!(index.score("a an of", 10).is_empty());
    }

    #[test]
    fn test_score_full_coverage() {
        let index = KeywordIndex::build(&[song("a", "autumn leaves fall")]);
        let hits = index.score("autumn leaves", 10);

        // coverage 1.0, density min(1, 2 / 4) = 0.5
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - (0.7 + 0.15)).abs() < 1e-6);
    }

    #[test]
    fn test_density_is_capped() {
        let index = KeywordIndex::build(&[song("a", "rain rain rain rain rain rain")]);
        let hits = index.score("rain", 10);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_matching_songs_are_excluded() {
        let index = KeywordIndex::build(&[song("a", "summer sun"), song("b", "winter snow")]);
        let hits = index.score("snow", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 1);
    }

    #[test]
    fn test_ties_keep_corpus_order_and_k_limits() {
        let index = KeywordIndex::build(&[
            song("a", "river"),
            song("b", "river"),
            song("c", "river"),
        ]);
        let hits = index.score("river", 2);
        assert_eq!(
            hits.iter().map(|h| h.position).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_score_ignores_token_order_and_query_case() {
        let index = KeywordIndex::build(&[
            song("a", "leaves autumn golden"),
            song("b", "golden autumn leaves"),
        ]);
        let lower = index.score("autumn leaves", 10);
        let upper = index.score("AUTUMN Leaves", 10);

        assert_eq!(lower, upper);
        assert!((lower[0].score - lower[1].score).abs() < f32::EPSILON);
    }

    #[test]
    fn test_themes_and_mood_are_indexed() {
        let songs = vec![Song::new(SongId::new("a"), "Untitled")
            .with_themes(["friendship"])
            .with_mood(["joyful"])];
        let index = KeywordIndex::build(&songs);
        assert_eq!(index.score("joyful friendship", 5).len(), 1);
    }
}
