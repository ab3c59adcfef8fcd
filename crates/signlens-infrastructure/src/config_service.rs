//! Configuration service implementation.
//!
//! Loads the root configuration from `config.toml`
//! (`~/.config/signlens/config.toml` unless another path is given).

use crate::paths::SignlensPaths;
use signlens_core::config::AppConfig;
use signlens_core::error::{Result, SignlensError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Configuration service that loads and caches the root configuration.
///
/// A missing file yields the defaults; a file that exists but does not parse
/// is an error.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// Uses `path`, or the default config file location when `None`.
    pub fn new(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => SignlensPaths::config_file()?,
        };
        Ok(Self {
            path,
            config: Arc::new(RwLock::new(None)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the configuration, loading it from file if not cached.
    pub async fn get_config(&self) -> Result<AppConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = self.load().await?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    async fn load(&self) -> Result<AppConfig> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no config file, using defaults");
                return Ok(AppConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            SignlensError::config(format!("{}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), "config loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::new(Some(&dir.path().join("config.toml"))).unwrap();

        let config = service.get_config().await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_partial_file_is_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nbind = \"0.0.0.0:8080\"\n\n[pipeline]\ncooldown_ms = 5000\n",
        )
        .unwrap();

        let config = ConfigService::new(Some(&path)).unwrap().get_config().await.unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.pipeline.cooldown_ms, 5_000);
        assert_eq!(config.pipeline.min_call_interval_ms, 2_500);
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline\ncooldown_ms = ").unwrap();

        let err = ConfigService::new(Some(&path)).unwrap().get_config().await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_config_is_cached_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let service = ConfigService::new(Some(&path)).unwrap();

        assert_eq!(service.get_config().await.unwrap().pipeline.shortlist_size, 7);

        std::fs::write(&path, "[pipeline]\nshortlist_size = 3\n").unwrap();
        assert_eq!(service.get_config().await.unwrap().pipeline.shortlist_size, 7);

        service.invalidate_cache();
        assert_eq!(service.get_config().await.unwrap().pipeline.shortlist_size, 3);
    }
}
