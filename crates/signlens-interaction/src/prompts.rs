//! Prompt templates for feature extraction (Stage A) and final
//! classification (Stage C).

use crate::inference_client::InferenceError;
use minijinja::{Environment, context};
use serde::Serialize;
use signlens_core::session::ConversationEntry;
use signlens_core::vocabulary::VocabularyEntry;

const STAGE_A: &str = "stage_a";
const STAGE_C: &str = "stage_c";

const STAGE_A_TEMPLATE: &str = r#"You are analyzing ASL frames from a webcam.

Return ONLY valid JSON (no markdown, no backticks).
Do NOT guess centimeters. Use HH/SW or normalized coords if you mention magnitude.

JSON schema:
{
  "handShapeKeywords": ["..."],
  "locationKeywords": ["..."],
  "motionKeywords": ["..."],
  "candidateLabels": ["..."],
  "confidence": 0.0
}

Rules:
- handShapeKeywords: short phrases like "fist", "thumb extended", "flat hand", "index+middle extended"
- locationKeywords: short phrases like "chin", "forehead", "center chest", "head level"
- motionKeywords: short phrases like "circular", "side-to-side wave", "finger flex", "tap", "up-down nod"
- candidateLabels: 3-5 likely labels (single words) based on what you see; if unsure, return []
- confidence: 0..1 for your own certainty in these features

Conversation context (previous detected signs): {{ context_signs }}
"#;

const STAGE_C_TEMPLATE: &str = r#"Analyze ASL frames (oldest→newest, last is current).

VOCABULARY (choose from these):
{% for sign in candidates %}
{{ sign.name }}:
    Description: {{ sign.description }}
    Hand shape: {{ sign.hand_shape }}
    Location: {{ sign.location }}
    Motion: {{ sign.motion }}
    Orientation: {{ sign.orientation }}
{%- if sign.similar %}
  Similar to: {{ sign.similar }}
{%- if sign.difference %}
  KEY DIFFERENCE: {{ sign.difference }}
{%- endif %}
{%- endif %}
{%- if sign.mistakes %}
  Common mistakes: {{ sign.mistakes }}
{%- endif %}
{% if not loop.last %}---{% endif %}
{%- endfor %}

PREVIOUS: {{ context_text }}

Return JSON only (no markdown):
{
  "detectedSign": "name OR null",
  "confidence": 0.85,
  "reasoning": "Hand: [shape] at [location]. Motion: [description]. This is '[SIGN]' because: [why]. Not '[SIMILAR]' because: [difference].",
  "handShape": "...",
  "handLocation": "...",
  "handOrientation": "...",
  "motion": "...",
  "alternativeSigns": [{"sign": "...", "confidence": 0.1, "reason": "..."}]
}

Rules:
- Use HH (head-height) / SW (shoulder-width) units
- Track motion across frames
- Explain differentiation from similar signs
- Only detect from vocabulary or null: {{ allowed }}
- Be concise but clear"#;

#[derive(Serialize)]
struct CandidateView<'a> {
    name: String,
    description: &'a str,
    hand_shape: &'a str,
    location: &'a str,
    motion: &'a str,
    orientation: &'a str,
    similar: String,
    difference: &'a str,
    mistakes: String,
}

impl<'a> From<&'a VocabularyEntry> for CandidateView<'a> {
    fn from(entry: &'a VocabularyEntry) -> Self {
        Self {
            name: entry.sign_name.to_uppercase(),
            description: &entry.description,
            hand_shape: entry.hand_shape.as_deref().unwrap_or("unspecified"),
            location: entry.location.as_deref().unwrap_or("unspecified"),
            motion: entry.motion.as_deref().unwrap_or("unspecified"),
            orientation: entry.orientation.as_deref().unwrap_or("unspecified"),
            similar: entry.similar_signs.join(", "),
            difference: entry.difference_from_similar.as_deref().unwrap_or(""),
            mistakes: entry.common_mistakes.join("; "),
        }
    }
}

/// Renders the Stage A and Stage C prompts.
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, InferenceError> {
        let mut env = Environment::new();
        env.add_template(STAGE_A, STAGE_A_TEMPLATE)
            .and_then(|_| env.add_template(STAGE_C, STAGE_C_TEMPLATE))
            .map_err(|e| InferenceError::Prompt(e.to_string()))?;
        Ok(Self { env })
    }

    /// Stage A prompt; `context_signs` are prior detections, oldest first.
    pub fn feature_prompt(&self, context_signs: &[String]) -> Result<String, InferenceError> {
        let context_signs = if context_signs.is_empty() {
            "(none)".to_string()
        } else {
            context_signs.join(", ")
        };
        self.render(STAGE_A, context! { context_signs })
    }

    /// Stage C prompt constrained to `candidates`.
    pub fn classification_prompt(
        &self,
        candidates: &[VocabularyEntry],
        context: &[ConversationEntry],
    ) -> Result<String, InferenceError> {
        let views: Vec<CandidateView<'_>> = candidates.iter().map(CandidateView::from).collect();
        let allowed = candidates
            .iter()
            .map(|c| c.sign_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.render(
            STAGE_C,
            context! {
                candidates => views,
                context_text => context_text(context),
                allowed => allowed,
            },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String, InferenceError> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(|e| InferenceError::Prompt(e.to_string()))
    }
}

/// `1. "hello" (90% confidence) → 2. "mother" (70% confidence)`
pub fn context_text(context: &[ConversationEntry]) -> String {
    if context.is_empty() {
        return "This is the first sign in the conversation.".to_string();
    }
    context
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{}. \"{}\" ({}% confidence)",
                i + 1,
                entry.sign,
                (entry.confidence * 100.0).round() as i64
            )
        })
        .collect::<Vec<_>>()
        .join(" → ")
}
