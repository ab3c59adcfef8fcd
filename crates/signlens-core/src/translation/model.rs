//! Classification and translation-history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An alternative the oracle considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeSign {
    #[serde(default)]
    pub sign: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

/// Outcome of one final (Stage C) classification call.
///
/// `detected_sign`, when present, is always one of `candidates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub detected_sign: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub hand_shape: String,
    #[serde(default)]
    pub hand_location: String,
    #[serde(default)]
    pub hand_orientation: String,
    #[serde(default)]
    pub motion: String,
    #[serde(default)]
    pub spatial_analysis: String,
    #[serde(default)]
    pub temporal_analysis: String,
    #[serde(default)]
    pub context_relevance: String,
    #[serde(default)]
    pub correction: Option<String>,
    #[serde(default)]
    pub alternative_signs: Vec<AlternativeSign>,
    #[serde(default)]
    pub differentiation_notes: String,
    /// Shortlist names actually offered to the oracle.
    #[serde(default)]
    pub candidates: Vec<String>,
    /// Stage A features the shortlist was built from, when Stage A ran.
    #[serde(default, rename = "stageA", skip_serializing_if = "Option::is_none")]
    pub stage_a: Option<ShortlistFeatures>,
}

impl ClassificationResult {
    /// Result used when there was nothing to classify against.
    pub fn empty_shortlist() -> Self {
        let unknown = || "unknown".to_string();
        let empty = || "Shortlist empty".to_string();
        Self {
            detected_sign: None,
            confidence: 0.0,
            reasoning: "No candidate signs available (shortlist empty).".to_string(),
            hand_shape: unknown(),
            hand_location: unknown(),
            hand_orientation: unknown(),
            motion: unknown(),
            spatial_analysis: empty(),
            temporal_analysis: empty(),
            context_relevance: empty(),
            correction: None,
            alternative_signs: Vec::new(),
            differentiation_notes: "No candidates to compare".to_string(),
            candidates: Vec::new(),
            stage_a: None,
        }
    }

    /// Stand-in answer for a repeated frame when nothing was classified yet.
    pub fn skipped_duplicate() -> Self {
        let unknown = || "unknown".to_string();
        let skipped = || "Skipped (duplicate frame)".to_string();
        Self {
            detected_sign: None,
            confidence: 0.0,
            reasoning: "Frame unchanged; skipped Gemini to save latency/cost.".to_string(),
            hand_shape: unknown(),
            hand_location: unknown(),
            hand_orientation: unknown(),
            motion: "static".to_string(),
            spatial_analysis: skipped(),
            temporal_analysis: skipped(),
            context_relevance: skipped(),
            correction: None,
            alternative_signs: Vec::new(),
            differentiation_notes: skipped(),
            candidates: Vec::new(),
            stage_a: None,
        }
    }

    /// Text shown to the client: the detected sign, or empty.
    pub fn display_text(&self) -> &str {
        self.detected_sign.as_deref().unwrap_or("")
    }
}

/// Compact features extracted from frames by Stage A.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortlistFeatures {
    pub hand_shape_keywords: Vec<String>,
    pub location_keywords: Vec<String>,
    pub motion_keywords: Vec<String>,
    pub candidate_labels: Vec<String>,
    pub confidence: f64,
}

impl ShortlistFeatures {
    /// Builds features from loosely-typed model output.
    ///
    /// Missing or non-array keyword lists become empty (non-string items are
    /// skipped); a missing or non-numeric confidence becomes 0.
    pub fn from_json_value(value: &Value) -> Self {
        let strings = |key: &str| -> Vec<String> {
            value
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            hand_shape_keywords: strings("handShapeKeywords"),
            location_keywords: strings("locationKeywords"),
            motion_keywords: strings("motionKeywords"),
            candidate_labels: strings("candidateLabels"),
            confidence: value
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        }
    }
}

/// One persisted translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub result: ClassificationResult,
    pub frame_count: usize,
}

impl TranslationRecord {
    pub fn new(result: ClassificationResult, frame_count: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            result,
            frame_count,
        }
    }
}

const JUDGE_REASON_CHARS: usize = 140;

/// Compact audit entry kept alongside the full translation records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeEntry {
    pub t: DateTime<Utc>,
    pub sign: Option<String>,
    pub conf: f64,
    /// Reasoning, cut to 140 characters.
    pub why: String,
    #[serde(default)]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub skipped: bool,
}

impl JudgeEntry {
    pub fn new(result: &ClassificationResult, skipped: bool) -> Self {
        Self {
            t: Utc::now(),
            sign: result.detected_sign.clone(),
            conf: result.confidence,
            why: result.reasoning.chars().take(JUDGE_REASON_CHARS).collect(),
            candidates: result.candidates.clone(),
            skipped,
        }
    }
}

/// Stored history of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationSession {
    pub session_id: String,
    #[serde(default)]
    pub translations: Vec<TranslationRecord>,
    #[serde(default)]
    pub judge_trail: Vec<JudgeEntry>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl TranslationSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            translations: Vec::new(),
            judge_trail: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn push(&mut self, record: TranslationRecord) {
        self.last_activity = record.timestamp.max(self.last_activity);
        self.translations.push(record);
    }

    pub fn push_judge(&mut self, entry: JudgeEntry) {
        self.last_activity = entry.t.max(self.last_activity);
        self.judge_trail.push(entry);
    }
}
