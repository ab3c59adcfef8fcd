//! Configuration models.
//!
//! `AppConfig` mirrors `config.toml`; every section and field has a default so
//! a missing file or a partial file is valid. `SecretConfig` mirrors
//! `secret.json` and only holds oracle credentials.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub vocabulary: VocabularyConfig,
    pub oracle: OracleConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            ws_path: "/ws".to_string(),
        }
    }
}

/// Admission, buffering and shortlist tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum spacing between two oracle dispatches for one session.
    pub min_call_interval_ms: u64,
    /// Window in which an identical frame is answered from cache.
    pub duplicate_ttl_ms: u64,
    /// Cooldown entered after a throttling failure.
    pub cooldown_ms: u64,
    /// Duplicate window for the one-shot `POST /api/translate` endpoint.
    pub request_duplicate_ttl_ms: u64,
    /// Keyed request state is pruned once more than this many keys are tracked.
    pub max_request_keys: usize,
    pub stage_a_enabled: bool,
    pub stage_a_ttl_ms: u64,
    /// How often the Stage A cache sweeper runs.
    pub stage_a_sweep_interval_ms: u64,
    /// Entries older than this are purged by the sweeper.
    pub stage_a_sweep_threshold_ms: u64,
    pub max_frame_history: usize,
    /// Previous frames sent alongside the current one.
    pub previous_frames_per_call: usize,
    pub max_conversation_history: usize,
    /// Conversation entries rendered into the Stage C prompt.
    pub context_window: usize,
    pub shortlist_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_call_interval_ms: 2_500,
            duplicate_ttl_ms: 2_500,
            cooldown_ms: 20_000,
            request_duplicate_ttl_ms: 10_000,
            max_request_keys: 500,
            stage_a_enabled: true,
            stage_a_ttl_ms: 12_000,
            stage_a_sweep_interval_ms: 10_000,
            stage_a_sweep_threshold_ms: 10_000,
            max_frame_history: 6,
            previous_frames_per_call: 2,
            max_conversation_history: 12,
            context_window: 5,
            shortlist_size: 7,
        }
    }
}

impl PipelineConfig {
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }

    pub fn duplicate_ttl(&self) -> Duration {
        Duration::from_millis(self.duplicate_ttl_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn request_duplicate_ttl(&self) -> Duration {
        Duration::from_millis(self.request_duplicate_ttl_ms)
    }

    pub fn stage_a_ttl(&self) -> Duration {
        Duration::from_millis(self.stage_a_ttl_ms)
    }

    pub fn stage_a_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.stage_a_sweep_interval_ms)
    }

    pub fn stage_a_sweep_threshold(&self) -> Duration {
        Duration::from_millis(self.stage_a_sweep_threshold_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub ttl_secs: u64,
    /// Vocabulary file; defaults to `<data_dir>/vocabulary.json`.
    pub path: Option<PathBuf>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            path: None,
        }
    }
}

impl VocabularyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            temperature: 0.4,
            top_p: 0.8,
            top_k: 40,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for vocabulary and session files; defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
}

/// Root of `secret.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub gemini: Option<GeminiSecret>,
}

/// Gemini credentials, in rotation order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeminiSecret {
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Single-key form kept for older files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl GeminiSecret {
    /// All configured keys, list first then the single key, blanks dropped.
    pub fn keys(&self) -> Vec<String> {
        self.api_keys
            .iter()
            .chain(self.api_key.iter())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}
