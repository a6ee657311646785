//! Theme and mood enrichment.
//!
//! Songs missing themes or mood are described to the model, which answers
//! with JSON lists. The extracted labels feed the keyword index and the
//! decision prompt.

use serde_json::Value;

use cadenza_core::Song;

use crate::error::{SelectError, SelectResult};
use crate::invoke::ModelInvoker;
use crate::prompt;

/// Themes and mood extracted for one song.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub themes: Vec<String>,
    pub mood: Vec<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty() && self.mood.is_empty()
    }
}

/// Counts from one enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub enriched: usize,
    /// Already had both themes and mood.
    pub skipped: usize,
    /// The model failed or gave nothing usable; the song is unchanged.
    pub failed: usize,
}

/// A string or a list of strings, trimmed, empties dropped.
fn labels(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&str> = match value {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse the model's JSON answer, tolerating code fences around it.
pub fn parse_enrichment(text: &str) -> SelectResult<Enrichment> {
    let trimmed = text.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SelectError::Response(format!("enrichment is not JSON: {e}")))?;
    Ok(Enrichment {
        themes: labels(value.get("themes")),
        mood: labels(value.get("mood")),
    })
}

/// Fills in missing themes and mood through a [`ModelInvoker`].
#[derive(Debug, Clone, Copy)]
pub struct SongEnricher<'a> {
    invoker: &'a ModelInvoker,
}

impl<'a> SongEnricher<'a> {
    pub fn new(invoker: &'a ModelInvoker) -> Self {
        Self { invoker }
    }

    /// Ask the model for one song's themes and mood.
    pub async fn analyze(&self, song: &Song) -> SelectResult<Enrichment> {
        let invocation = self.invoker.invoke(&prompt::enrichment_request(song)).await?;
        parse_enrichment(&invocation.text)
    }

    /// Enrich songs in place, at most `limit` of them when given.
    ///
    /// Only empty fields are filled. A failure leaves the song unchanged and
    /// moves on to the next one.
    pub async fn enrich(&self, songs: &mut [Song], limit: Option<usize>) -> EnrichSummary {
        let mut summary = EnrichSummary::default();
        let pending = songs.iter().filter(|s| !s.is_enriched()).count();
        let total = limit.map_or(pending, |limit| limit.min(pending));
        let mut attempted = 0;

        for song in songs.iter_mut() {
            if song.is_enriched() {
                summary.skipped += 1;
                continue;
            }
            if attempted == total {
                break;
            }
            attempted += 1;
            log::info!("Enriching {}/{}: {}", attempted, total, song.display_title());

            match self.analyze(song).await {
                Ok(enrichment) if !enrichment.is_empty() => {
                    if song.themes.is_empty() {
                        song.themes = enrichment.themes;
                    }
                    if song.mood.is_empty() {
                        song.mood = enrichment.mood;
                    }
                    summary.enriched += 1;
                }
                Ok(_) => {
                    log::warn!("No themes or mood found for {}", song.display_title());
                    summary.failed += 1;
                }
                Err(e) => {
                    log::warn!("Failed to enrich {}: {}", song.display_title(), e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
