//! Stage C: the constrained final classification call.

use signlens_core::Frame;
use signlens_core::session::ConversationEntry;
use signlens_core::translation::ClassificationResult;
use signlens_core::vocabulary::VocabularyEntry;
use signlens_interaction::response_parser::parse_classification;
use signlens_interaction::{InferenceClient, InferenceError, PromptRenderer};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FinalClassifier {
    inference: InferenceClient,
    prompts: Arc<PromptRenderer>,
}

impl FinalClassifier {
    pub fn new(inference: InferenceClient, prompts: Arc<PromptRenderer>) -> Self {
        Self { inference, prompts }
    }

    /// Classifies `frames` (oldest first) against `candidates`.
    ///
    /// An empty candidate list short-circuits to
    /// [`ClassificationResult::empty_shortlist`] without calling the oracle.
    /// The returned `detected_sign` is always a candidate name or `None`.
    pub async fn classify(
        &self,
        candidates: &[VocabularyEntry],
        context: &[ConversationEntry],
        frames: &[Frame],
    ) -> Result<ClassificationResult, InferenceError> {
        if candidates.is_empty() {
            return Ok(ClassificationResult::empty_shortlist());
        }

        let names: Vec<String> = candidates.iter().map(|c| c.sign_name.clone()).collect();
        debug!(candidates = ?names, frames = frames.len(), "stage C");

        let prompt = self.prompts.classification_prompt(candidates, context)?;
        let raw = self.inference.classify(&prompt, frames).await?;

        let mut result = match parse_classification(&raw) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, raw = %raw, "stage C response unusable");
                return Err(InferenceError::malformed(e, raw));
            }
        };

        result.detected_sign = constrain(result.detected_sign.take(), &names);
        result.candidates = names;
        Ok(result)
    }
}

/// Maps `detected` onto the canonical candidate name, or `None` when it is
/// not a candidate.
fn constrain(detected: Option<String>, candidates: &[String]) -> Option<String> {
    let detected = detected?;
    let wanted = detected.trim().to_lowercase();
    let canonical = candidates.iter().find(|name| name.to_lowercase() == wanted).cloned();
    if canonical.is_none() {
        warn!(sign = %detected, "oracle answered outside the shortlist, discarding");
    }
    canonical
}
