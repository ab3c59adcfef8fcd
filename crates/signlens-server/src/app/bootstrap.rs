use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use signlens_application::{TranslationPipeline, VocabularyCache};
use signlens_core::config::AppConfig;
use signlens_core::oracle::Credential;
use signlens_core::secret::SecretService;
use signlens_core::{Clock, SystemClock};
use signlens_infrastructure::{
    AsyncDirTranslationRepository, ConfigService, JsonVocabularyRepository, SecretServiceImpl,
    SignlensPaths,
};
use signlens_interaction::{CredentialPool, GeminiAgentFactory, InferenceClient};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::AppState;

/// Command-line overrides applied on top of `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Fully wired application plus its background tasks.
pub struct AppBootstrap {
    pub app_state: AppState,
    pub config: AppConfig,
    cancel: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl AppBootstrap {
    pub async fn initialize(options: BootstrapOptions) -> Result<Self> {
        let config_service = ConfigService::new(options.config_path.as_deref())
            .context("Failed to resolve config file location")?;
        let mut config = config_service
            .get_config()
            .await
            .with_context(|| format!("Failed to load {}", config_service.path().display()))?;
        if let Some(bind) = options.bind {
            config.server.bind = bind;
        }
        if !config.server.ws_path.starts_with('/') {
            bail!("server.ws_path must start with '/': {:?}", config.server.ws_path);
        }
        tracing::info!("[Bootstrap] Config loaded from {}", config_service.path().display());

        // secret.json lives next to config.toml.
        let secret_path = config_service.path().with_file_name("secret.json");
        let secret_service = SecretServiceImpl::new(Some(&secret_path))?;
        let secrets = secret_service
            .load_secrets()
            .await
            .context("Failed to load Gemini credentials")?;
        let gemini = secrets.gemini.unwrap_or_default();
        if gemini.api_keys.is_empty() {
            bail!(
                "No Gemini API keys configured; set GEMINI_API_KEY or add api_keys to {}",
                secret_path.display()
            );
        }
        if let Some(model) = gemini.model_name.filter(|m| !m.trim().is_empty()) {
            config.oracle.model = model;
        }
        tracing::info!(
            "[Bootstrap] {} Gemini credential(s), model {}",
            gemini.api_keys.len(),
            config.oracle.model
        );

        let factory = GeminiAgentFactory::new(config.oracle.clone())
            .context("Failed to build Gemini HTTP client")?;
        let credentials = gemini.api_keys.into_iter().map(Credential::new).collect();
        let pool = CredentialPool::new(credentials, Arc::new(factory))?;
        let inference = InferenceClient::new(Arc::new(pool));

        let data_dir = resolve_data_dir(options.data_dir, &config)?;
        let vocabulary_path = config
            .vocabulary
            .path
            .clone()
            .unwrap_or_else(|| SignlensPaths::vocabulary_file(&data_dir));
        tracing::info!("[Bootstrap] Data directory: {}", data_dir.display());

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let vocabulary = Arc::new(VocabularyCache::new(
            Arc::new(JsonVocabularyRepository::new(&vocabulary_path)),
            clock.clone(),
            config.vocabulary.ttl(),
        ));
        let translations = Arc::new(
            AsyncDirTranslationRepository::new(SignlensPaths::sessions_dir(&data_dir))
                .await
                .context("Failed to prepare session directory")?,
        );

        let pipeline = Arc::new(TranslationPipeline::new(
            config.pipeline.clone(),
            clock,
            inference,
            vocabulary,
            translations,
        )?);

        // Surface a broken vocabulary file at startup rather than on the first frame.
        let signs = pipeline
            .vocabulary()
            .get()
            .await
            .with_context(|| format!("Failed to load vocabulary from {}", vocabulary_path.display()))?;
        tracing::info!("[Bootstrap] Vocabulary ready: {} signs", signs.len());

        let cancel = CancellationToken::new();
        let sweeper = pipeline.shortlist().spawn_sweeper(
            config.pipeline.stage_a_sweep_interval(),
            config.pipeline.stage_a_sweep_threshold(),
            cancel.clone(),
        );

        Ok(Self {
            app_state: AppState::new(pipeline),
            config,
            cancel,
            sweeper,
        })
    }

    /// Stops background tasks and drops every live session.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.sweeper.await {
            tracing::warn!("[Bootstrap] Sweeper task ended abnormally: {}", e);
        }
        self.app_state.pipeline.sessions().clear().await;
        tracing::info!("[Bootstrap] Shutdown complete");
    }
}

fn resolve_data_dir(cli: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    if let Some(dir) = cli.or_else(|| config.storage.data_dir.clone()) {
        return Ok(expand_home(&dir));
    }
    Ok(SignlensPaths::data_dir()?)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_data_dir_wins_over_config() {
        let mut config = AppConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/from/config"));

        let dir = resolve_data_dir(Some(PathBuf::from("/from/cli")), &config).unwrap();
        assert_eq!(dir, PathBuf::from("/from/cli"));

        let dir = resolve_data_dir(None, &config).unwrap();
        assert_eq!(dir, PathBuf::from("/from/config"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/abs/dir")), PathBuf::from("/abs/dir"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/signlens")), home.join("signlens"));
        }
    }
}
