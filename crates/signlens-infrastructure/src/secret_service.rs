//! Secret service implementation.
//!
//! Gemini keys come from `secret.json` and from the environment
//! (`GEMINI_API_KEY_1` .. `GEMINI_API_KEY_7`, then `GEMINI_API_KEY`). File keys
//! come first; duplicates keep their first position.

use crate::paths::SignlensPaths;
use signlens_core::config::{GeminiSecret, SecretConfig};
use signlens_core::error::{Result, SignlensError};
use signlens_core::secret::SecretService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const NUMBERED_ENV_KEYS: usize = 7;
const SINGLE_ENV_KEY: &str = "GEMINI_API_KEY";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Service for loading oracle credentials.
///
/// Secrets are never logged; only counts are.
#[derive(Clone)]
pub struct SecretServiceImpl {
    path: PathBuf,
    env: EnvLookup,
}

impl SecretServiceImpl {
    /// Reads `path`, or the default `secret.json` location when `None`.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => SignlensPaths::secret_file()?,
        };
        Ok(Self {
            path,
            env: Arc::new(|name| std::env::var(name).ok()),
        })
    }

    /// Replaces the environment lookup.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    async fn load_file(&self) -> Result<SecretConfig> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SignlensError::config(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no secret file");
                Ok(SecretConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn env_keys(&self) -> Vec<String> {
        let numbered = (1..=NUMBERED_ENV_KEYS).map(|i| format!("{SINGLE_ENV_KEY}_{i}"));
        numbered
            .chain(std::iter::once(SINGLE_ENV_KEY.to_string()))
            .filter_map(|name| (self.env)(&name))
            .collect()
    }
}

#[async_trait::async_trait]
impl SecretService for SecretServiceImpl {
    async fn load_secrets(&self) -> Result<SecretConfig> {
        let mut secrets = self.load_file().await?;
        let file_keys = secrets.gemini.as_ref().map(GeminiSecret::keys).unwrap_or_default();
        let env_keys = self.env_keys();

        let mut keys: Vec<String> = Vec::with_capacity(file_keys.len() + env_keys.len());
        for key in file_keys.into_iter().chain(env_keys) {
            let key = key.trim().to_string();
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            warn!("no Gemini API keys configured");
        } else {
            debug!(count = keys.len(), "Gemini API keys loaded");
        }

        let gemini = secrets.gemini.get_or_insert_with(GeminiSecret::default);
        gemini.api_keys = keys;
        gemini.api_key = None;
        Ok(secrets)
    }
}
