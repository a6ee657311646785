//! Prompts sent to the generative model.
//!
//! The corpus is Russian-language, so the prompts are too. The decision
//! prompt asks for JSON through a response schema and also describes the
//! plain `ВЫБОР: <n>` format, which the parser falls back to.

use cadenza_core::{SearchResult, Song};
use serde_json::{json, Value};

use crate::provider::GenerationRequest;

/// Lyrics longer than this many characters are cut in the decision prompt.
pub const LYRICS_PREVIEW_CHARS: usize = 300;

const SELECTION_SYSTEM: &str = "Ты эксперт по музыке, который помогает пользователям \
найти идеальную песню для их настроения и ситуации.";

const ENHANCE_SYSTEM: &str = "Ты помогаешь искать песни по смыслу. Отвечай только \
переформулированным запросом, без пояснений.";

const ENRICH_SYSTEM: &str = "Ты эксперт по анализу музыки. Извлекай темы и настроение \
из песен. Отвечай только валидным JSON.";

/// Temperature for the query rewrite.
const ENHANCE_TEMPERATURE: f32 = 0.3;

/// Temperature for theme and mood extraction.
const ENRICH_TEMPERATURE: f32 = 0.3;

/// A rephrased query is a sentence or two.
const ENHANCE_MAX_TOKENS: u32 = 128;

const ENRICH_MAX_TOKENS: u32 = 256;

fn lyrics_preview(lyrics: &str) -> String {
    if lyrics.chars().count() > LYRICS_PREVIEW_CHARS {
        let cut: String = lyrics.chars().take(LYRICS_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        lyrics.to_string()
    }
}

/// One numbered candidate block.
pub fn format_candidate(song: &Song, number: usize) -> String {
    let mut block = format!("\n{}. Название: {}", number, song.display_title());
    if let Some(artist) = song.artist.as_deref().filter(|a| !a.is_empty()) {
        block.push_str(" | Исполнитель: ");
        block.push_str(artist);
    }
    if let Some(lyrics) = song.lyrics.as_deref().filter(|l| !l.is_empty()) {
        block.push_str("\n   Текст: ");
        block.push_str(&lyrics_preview(lyrics));
    }
    if !song.themes.is_empty() {
        block.push_str("\n   Темы: ");
        block.push_str(&song.themes.join(", "));
    }
    if !song.mood.is_empty() {
        block.push_str("\n   Настроение: ");
        block.push_str(&song.mood.join(", "));
    }
    block.push('\n');
    block
}

/// Schema of the structured selection answer.
pub fn selection_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "selected_index": {"type": "integer"},
            "reasoning": {"type": "string"},
            "confidence": {"type": "number"}
        },
        "required": ["selected_index", "reasoning"]
    })
}

/// Ask the model to pick one of `candidates` for `query`.
pub fn selection_request(query: &str, candidates: &[SearchResult], temperature: f32) -> GenerationRequest {
    let listing: String = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| format_candidate(&candidate.song, i + 1))
        .collect();

    let prompt = format!(
        r#"Пользователь хочет найти песню по следующему описанию:

"{query}"

Вот несколько подходящих песен, найденных по смыслу:
{listing}
Твоя задача:
1. Выбери ОДНУ лучшую песню, которая наиболее точно соответствует запросу пользователя
2. Объясни, почему именно эта песня подходит лучше всего
3. Оцени уверенность в выборе числом от 0 до 1

Ответь в формате JSON:
{{"selected_index": <номер песни от 1 до {count}>, "reasoning": "<объяснение>", "confidence": <число>}}

Если JSON невозможен, ответь так:
ВЫБОР: [номер песни]
ОБЪЯСНЕНИЕ: [подробное объяснение]"#,
        count = candidates.len()
    );

    GenerationRequest::new(prompt)
        .with_system(SELECTION_SYSTEM)
        .with_temperature(temperature)
        .with_schema(selection_schema())
}

/// Ask the model to rephrase a query for semantic search.
pub fn enhancement_request(query: &str) -> GenerationRequest {
    let prompt = format!(
        "Перепиши запрос для поиска песни так, чтобы он лучше описывал темы, \
         образы и настроение искомой песни. Сохрани язык запроса.\n\nЗапрос: \"{query}\""
    );
    GenerationRequest::new(prompt)
        .with_system(ENHANCE_SYSTEM)
        .with_temperature(ENHANCE_TEMPERATURE)
        .with_max_output_tokens(ENHANCE_MAX_TOKENS)
}

/// Schema of the enrichment answer.
pub fn enrichment_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "themes": {"type": "array", "items": {"type": "string"}},
            "mood": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["themes", "mood"]
    })
}

/// Ask the model for the themes and mood of one song.
pub fn enrichment_request(song: &Song) -> GenerationRequest {
    let mut text = format!("Название: {}", song.display_title());
    if let Some(lyrics) = song.lyrics.as_deref().filter(|l| !l.is_empty()) {
        text.push_str("\nТекст:\n");
        text.push_str(lyrics);
    }

    let prompt = format!(
        r#"Проанализируй эту песню и определи:

1. Темы (themes) - основные темы и идеи песни (3-5 ключевых слов/фраз)
2. Настроение (mood) - эмоциональное настроение песни (2-3 слова)

Песня:
{text}

Ответь ТОЛЬКО в формате JSON (без дополнительного текста):
{{"themes": ["тема1", "тема2", "тема3"], "mood": ["настроение1", "настроение2"]}}"#
    );

    GenerationRequest::new(prompt)
        .with_system(ENRICH_SYSTEM)
        .with_temperature(ENRICH_TEMPERATURE)
        .with_max_output_tokens(ENRICH_MAX_TOKENS)
        .with_schema(enrichment_schema())
}
