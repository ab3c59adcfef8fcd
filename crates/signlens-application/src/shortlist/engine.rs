use super::scoring;
use signlens_core::config::PipelineConfig;
use signlens_core::translation::ShortlistFeatures;
use signlens_core::vocabulary::VocabularyEntry;
use signlens_core::{Clock, Frame};
use signlens_interaction::response_parser::parse_features;
use signlens_interaction::{InferenceClient, InferenceError, PromptRenderer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct CachedFeatures {
    extracted_at: Instant,
    features: ShortlistFeatures,
}

/// Two-stage candidate narrowing.
///
/// Stage A asks the oracle for compact features and caches them per session
/// key; Stage B scores the vocabulary against them (see [`scoring`]).
pub struct ShortlistEngine {
    inference: InferenceClient,
    prompts: Arc<PromptRenderer>,
    clock: Arc<dyn Clock>,
    enabled: bool,
    ttl: Duration,
    limit: usize,
    cache: Mutex<HashMap<String, CachedFeatures>>,
}

impl ShortlistEngine {
    pub fn new(
        inference: InferenceClient,
        prompts: Arc<PromptRenderer>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            inference,
            prompts,
            clock,
            enabled: config.stage_a_enabled,
            ttl: config.stage_a_ttl(),
            limit: config.shortlist_size,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// False when Stage A is switched off and Stage B sees empty features.
    pub fn stage_a_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedFeatures>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stage A. With a `session_key` the features are cached for the TTL.
    ///
    /// Oracle failures propagate so the caller can apply its cooldown and
    /// fatal policies; an unparseable answer degrades to empty features.
    pub async fn features(
        &self,
        session_key: Option<&str>,
        frames: &[Frame],
        context_signs: &[String],
    ) -> Result<ShortlistFeatures, InferenceError> {
        if !self.enabled {
            return Ok(ShortlistFeatures::default());
        }

        if let Some(key) = session_key {
            let now = self.clock.now();
            let hit = self
                .lock()
                .get(key)
                .filter(|cached| now.saturating_duration_since(cached.extracted_at) < self.ttl)
                .map(|cached| cached.features.clone());
            if let Some(features) = hit {
                debug!(session_id = key, "stage A cache hit");
                return Ok(features);
            }
        }

        let prompt = self.prompts.feature_prompt(context_signs)?;
        let raw = self.inference.classify(&prompt, frames).await?;
        let features = match parse_features(&raw) {
            Ok(features) => features,
            Err(e) => {
                warn!(error = %e, raw = %raw, "stage A response unusable, using empty features");
                ShortlistFeatures::default()
            }
        };
        debug!(
            labels = ?features.candidate_labels,
            confidence = features.confidence,
            "stage A features extracted"
        );

        if let Some(key) = session_key {
            self.lock().insert(
                key.to_string(),
                CachedFeatures {
                    extracted_at: self.clock.now(),
                    features: features.clone(),
                },
            );
        }
        Ok(features)
    }

    /// Stage B over `vocabulary` with the configured limit.
    pub fn shortlist(&self, vocabulary: &[VocabularyEntry], features: &ShortlistFeatures) -> Vec<VocabularyEntry> {
        scoring::shortlist(vocabulary, features, self.limit)
    }

    /// Drops the cached features of one session.
    pub fn forget(&self, session_key: &str) {
        self.lock().remove(session_key);
    }

    /// Removes entries older than `threshold`; returns how many were dropped.
    pub fn sweep(&self, threshold: Duration) -> usize {
        let now = self.clock.now();
        let mut cache = self.lock();
        let before = cache.len();
        cache.retain(|_, cached| now.saturating_duration_since(cached.extracted_at) < threshold);
        before - cache.len()
    }

    pub fn cached_sessions(&self) -> usize {
        self.lock().len()
    }

    /// Spawns the periodic sweeper; it stops when `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        threshold: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("stage A sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = engine.sweep(threshold);
                        if purged > 0 {
                            debug!(purged, "stage A cache swept");
                        }
                    }
                }
            }
        })
    }
}
