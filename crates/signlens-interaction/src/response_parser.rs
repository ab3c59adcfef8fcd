//! Tolerant parsing of free-text model output.
//!
//! Models are asked for bare JSON but routinely wrap it in markdown fences or
//! surround it with prose. The parser strips known fences, then scans for the
//! first balanced JSON object while respecting string literals and escapes.
//! Failures are reported as [`ParseError`] and never panic.

use regex::Regex;
use serde_json::Value;
use signlens_core::translation::{AlternativeSign, ClassificationResult, ShortlistFeatures};
use std::sync::LazyLock;
use thiserror::Error;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```json\s*").expect("static regex"));
static FENCE_ANY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```\s*").expect("static regex"));

const REQUIRED_FIELDS: [&str; 3] = ["detectedSign", "confidence", "reasoning"];

/// Why a model answer could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no JSON object start '{{' found in model response")]
    NoJsonObject,
    #[error("unterminated JSON object in model response")]
    Unterminated,
    #[error("invalid JSON in model response: {0}")]
    InvalidJson(String),
    #[error("model response is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Removes ```json / ``` fences and trims.
pub fn strip_code_fences(text: &str) -> String {
    let without_open = FENCE_OPEN.replace_all(text.trim(), "");
    FENCE_ANY.replace_all(&without_open, "").trim().to_string()
}

/// Returns the first balanced `{...}` in `text` after fence stripping.
pub fn extract_first_json_object(text: &str) -> Result<String, ParseError> {
    let s = strip_code_fences(text);
    let start = s.find('{').ok_or(ParseError::NoJsonObject)?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in s[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Ok(s[start..end].to_string());
                }
            }
            _ => {}
        }
    }

    Err(ParseError::Unterminated)
}

fn parse_object(text: &str) -> Result<Value, ParseError> {
    let json = extract_first_json_object(text)?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    Ok(value)
}

/// Parses a Stage A answer into normalized features.
pub fn parse_features(text: &str) -> Result<ShortlistFeatures, ParseError> {
    let value = parse_object(text)?;
    Ok(ShortlistFeatures::from_json_value(&value))
}

/// Parses a Stage C answer.
///
/// `detectedSign`, `confidence` and `reasoning` must be present; textual
/// nulls (`"null"`, `"none"`, empty) become a real null. `candidates` is left
/// empty for the caller to fill in.
pub fn parse_classification(text: &str) -> Result<ClassificationResult, ParseError> {
    let value = parse_object(text)?;

    for field in REQUIRED_FIELDS {
        if value.get(field).is_none() {
            return Err(ParseError::MissingField(field));
        }
    }

    let text_field = |key: &str| -> String {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let alternative_signs = value
        .get("alternativeSigns")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<AlternativeSign>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(ClassificationResult {
        detected_sign: normalize_detected_sign(value.get("detectedSign")),
        confidence: value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        reasoning: text_field("reasoning"),
        hand_shape: text_field("handShape"),
        hand_location: text_field("handLocation"),
        hand_orientation: text_field("handOrientation"),
        motion: text_field("motion"),
        spatial_analysis: text_field("spatialAnalysis"),
        temporal_analysis: text_field("temporalAnalysis"),
        context_relevance: text_field("contextRelevance"),
        correction: value
            .get("correction")
            .and_then(Value::as_str)
            .map(str::to_string),
        alternative_signs,
        differentiation_notes: text_field("differentiationNotes"),
        candidates: Vec::new(),
        stage_a: None,
    })
}

fn normalize_detected_sign(value: Option<&Value>) -> Option<String> {
    let raw = value?.as_str()?.trim();
    match raw.to_lowercase().as_str() {
        "" | "null" | "none" => None,
        _ => Some(raw.to_string()),
    }
}
