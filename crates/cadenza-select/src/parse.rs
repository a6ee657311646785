//! Recovering a selection from model output.
//!
//! Structured JSON is tried first. Models that ignore the schema are
//! handled by scanning the raw text for the textual answer format, then
//! for any in-range number.

use regex::Regex;
use serde_json::Value;

/// Confidence reported when the model gives none.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// How a selection was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// Well-formed JSON with an in-range `selected_index`.
    Structured,
    /// A `ВЫБОР: n` line or a line starting with `n.`.
    Pattern,
    /// The first in-range number anywhere in the text.
    NumberScan,
}

/// A 1-based choice among the candidates shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub reasoning: String,
    /// 0.0..=1.0.
    pub confidence: f32,
    pub source: SelectionSource,
}

/// Extracts selections from model responses.
#[derive(Debug, Clone)]
pub struct SelectionParser {
    /// Tried in order; the first in-range capture wins.
    patterns: Vec<Regex>,
    number: Regex,
    explanation: Regex,
}

impl SelectionParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: vec![
                Regex::new(r"(?i)ВЫБОР\s*:\s*\[?\s*([0-9]+)")?,
                Regex::new(r"(?m)^\s*([0-9]+)\.")?,
            ],
            number: Regex::new(r"\b([0-9]+)\b")?,
            explanation: Regex::new(r"(?is)ОБЪЯСНЕНИЕ\s*:\s*(.+)")?,
        })
    }

    /// Recover a selection from `text` given `candidate_count` candidates.
    ///
    /// Returns `None` when no in-range index can be found; the caller then
    /// falls back to the first candidate.
    pub fn parse(&self, text: &str, candidate_count: usize) -> Option<Selection> {
        if candidate_count == 0 {
            return None;
        }
        if let Some(selection) = parse_structured(text, candidate_count) {
            return Some(selection);
        }

        let in_range = |n: &usize| (1..=candidate_count).contains(n);

        let from_pattern = self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .filter(in_range)
        });
        let (index, source) = match from_pattern {
            Some(index) => (index, SelectionSource::Pattern),
            None => {
                let index = self
                    .number
                    .captures_iter(text)
                    .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
                    .find(in_range)?;
                (index, SelectionSource::NumberScan)
            }
        };

        Some(Selection {
            index,
            reasoning: self.reasoning(text),
            confidence: DEFAULT_CONFIDENCE,
            source,
        })
    }

    fn reasoning(&self, text: &str) -> String {
        self.explanation
            .captures(text)
            .and_then(|c| c.get(1))
            .map_or(text, |m| m.as_str())
            .trim()
            .to_string()
    }
}

/// The JSON object in `text`, allowing for code fences or chatter around it.
fn json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let trimmed = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_structured(text: &str, candidate_count: usize) -> Option<Selection> {
    let object = json_object(text)?;
    let index = match object.get("selected_index")? {
        Value::Number(n) => usize::try_from(n.as_u64()?).ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if !(1..=candidate_count).contains(&index) {
        return None;
    }

    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map_or(DEFAULT_CONFIDENCE, |c| (c as f32).clamp(0.0, 1.0));

    Some(Selection {
        index,
        reasoning,
        confidence,
        source: SelectionSource::Structured,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> SelectionParser {
        SelectionParser::new().unwrap()
    }

    #[test]
    fn test_structured_selection() {
        let selection = parser()
            .parse(r#"{"selected_index": 2, "reasoning": "x"}"#, 3)
            .unwrap();
        assert_eq!(selection.index, 2);
        assert_eq!(selection.reasoning, "x");
        assert!((selection.confidence - DEFAULT_CONFIDENCE).abs() < f32::EPSILON);
        assert_eq!(selection.source, SelectionSource::Structured);
    }

    #[test]
    fn test_structured_confidence_is_clamped() {
        let selection = parser()
            .parse(r#"{"selected_index": 1, "reasoning": "", "confidence": 1.7}"#, 1)
            .unwrap();
        assert!((selection.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_structured_inside_code_fence() {
        let text = "```json\n{\"selected_index\": 3, \"reasoning\": \"лучше всего\", \"confidence\": 0.9}\n```";
        let selection = parser().parse(text, 3).unwrap();
        assert_eq!(selection.index, 3);
        assert_eq!(selection.reasoning, "лучше всего");
        assert!((selection.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_choice_yields_none() {
        assert_eq!(parser().parse("ВЫБОР: 5", 3), None);
    }

    #[test]
    fn test_out_of_range_json_falls_through_to_scan() {
        let selection = parser()
            .parse(r#"{"selected_index": 7, "reasoning": "песня 2 ближе"}"#, 3)
            .unwrap();
        assert_eq!(selection.index, 2);
        assert_eq!(selection.source, SelectionSource::NumberScan);
    }

    #[test]
    fn test_textual_format() {
        let text = "ВЫБОР: 2\nОБЪЯСНЕНИЕ: Эта песня про осенние листья.";
        let selection = parser().parse(text, 3).unwrap();
        assert_eq!(selection.index, 2);
        assert_eq!(selection.reasoning, "Эта песня про осенние листья.");
        assert_eq!(selection.source, SelectionSource::Pattern);
    }

    #[test]
    fn test_textual_format_is_case_insensitive() {
        let selection = parser().parse("выбор: [3]", 3).unwrap();
        assert_eq!(selection.index, 3);
        assert_eq!(selection.reasoning, "выбор: [3]");
    }

    #[test]
    fn test_numbered_line() {
        let text = "Думаю, лучше всего подходит\n2. Листопад";
        let selection = parser().parse(text, 2).unwrap();
        assert_eq!(selection.index, 2);
        assert_eq!(selection.source, SelectionSource::Pattern);
    }

    #[test]
    fn test_number_scan_skips_out_of_range() {
        let selection = parser().parse("Из 10 песен мне нравится 4", 5).unwrap();
        assert_eq!(selection.index, 4);
        assert_eq!(selection.source, SelectionSource::NumberScan);
    }

    #[test]
    fn test_no_numbers() {
        assert_eq!(parser().parse("не могу выбрать", 3), None);
        assert_eq!(parser().parse("", 3), None);
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(parser().parse(r#"{"selected_index": 1}"#, 0), None);
    }
}
