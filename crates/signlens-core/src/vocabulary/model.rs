//! Vocabulary entry model.

use serde::{Deserialize, Serialize};

/// A single sign the classifier may answer with.
///
/// `sign_name` is the unique, lowercase key. Entries are sourced externally
/// and are read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub sign_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,
    #[serde(default)]
    pub similar_signs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference_from_similar: Option<String>,
    #[serde(default)]
    pub common_mistakes: Vec<String>,
    #[serde(default)]
    pub is_phrase: bool,
}

impl VocabularyEntry {
    /// Creates an entry with only a name and description.
    pub fn new(sign_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            sign_name: normalize_sign_name(&sign_name.into()),
            description: description.into(),
            hand_shape: None,
            location: None,
            motion: None,
            orientation: None,
            similar_signs: Vec::new(),
            difference_from_similar: None,
            common_mistakes: Vec::new(),
            is_phrase: false,
        }
    }

    pub fn with_hand_shape(mut self, hand_shape: impl Into<String>) -> Self {
        self.hand_shape = Some(hand_shape.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_motion(mut self, motion: impl Into<String>) -> Self {
        self.motion = Some(motion.into());
        self
    }

    pub fn with_orientation(mut self, orientation: impl Into<String>) -> Self {
        self.orientation = Some(orientation.into());
        self
    }

    pub fn with_similar_signs<I, S>(mut self, signs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.similar_signs = signs.into_iter().map(Into::into).collect();
        self
    }

    /// Lowercased text over every descriptive field, used for keyword matching.
    pub fn haystack(&self) -> String {
        let optional = [
            self.hand_shape.as_deref(),
            self.location.as_deref(),
            self.motion.as_deref(),
            self.orientation.as_deref(),
        ];

        let mut parts: Vec<&str> = vec![&self.sign_name, &self.description];
        parts.extend(optional.into_iter().flatten());
        parts.extend(self.similar_signs.iter().map(String::as_str));
        if let Some(diff) = self.difference_from_similar.as_deref() {
            parts.push(diff);
        }
        parts.extend(self.common_mistakes.iter().map(String::as_str));

        parts.join(" ").to_lowercase()
    }

    /// Normalizes the key in place (trim + lowercase).
    pub fn normalized(mut self) -> Self {
        self.sign_name = normalize_sign_name(&self.sign_name);
        self
    }
}

fn normalize_sign_name(name: &str) -> String {
    name.trim().to_lowercase()
}
