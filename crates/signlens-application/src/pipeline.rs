//! Streaming admission and inference dispatch.
//!
//! [`TranslationPipeline`] ties the pieces together for one process: it owns
//! the session registry, evaluates every incoming frame against the session's
//! admission state, runs Stages A to C for admitted frames and folds the
//! outcome back into the session.

use crate::classifier::FinalClassifier;
use crate::session::{AdmissionController, AdmissionDecision, CachedReason, SessionHandle, SessionRegistry};
use crate::shortlist::ShortlistEngine;
use crate::vocabulary_cache::VocabularyCache;
use signlens_core::config::PipelineConfig;
use signlens_core::session::{ConversationEntry, SessionState};
use signlens_core::translation::{ClassificationResult, JudgeEntry, TranslationRecord, TranslationRepository};
use signlens_core::{Clock, Frame, SignlensError};
use signlens_interaction::{InferenceClient, InferenceError, PromptRenderer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Request key used by the one-shot endpoint when the client sends none.
pub const ANONYMOUS_REQUEST_KEY: &str = "no-session";

const DAILY_QUOTA_MESSAGE: &str =
    "Gemini daily quota exhausted (free tier, per-project). Live translation paused.";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Domain(#[from] SignlensError),
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Inference(e) if e.is_fatal())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Inference(e) if e.is_transient())
    }
}

/// A frame answered from the session's last good result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReply {
    pub text: String,
    pub confidence: f64,
    pub reason: CachedReason,
}

impl CachedReply {
    pub fn throttled(&self) -> bool {
        self.reason == CachedReason::Throttled
    }
}

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Result(ClassificationResult),
    Cached(CachedReply),
    Error { message: String, fatal: bool },
}

/// Outcome of [`TranslationPipeline::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameDecision {
    /// Answer immediately; no oracle call.
    Reply(Reply),
    /// Admitted: the caller must run [`TranslationPipeline::dispatch`].
    Dispatch,
    /// Nothing to send.
    Drop,
}

/// Outcome of [`TranslationPipeline::translate`].
#[derive(Debug, Clone, PartialEq)]
pub enum KeyedOutcome {
    /// The oracle was called for this frame.
    Classified(ClassificationResult),
    /// Same frame as the key's previous request; answered without a call.
    Skipped(ClassificationResult),
}

/// Builds a cached reply from the last good result, or a placeholder when
/// nothing has succeeded yet.
fn cached_reply(state: &SessionState, reason: CachedReason) -> CachedReply {
    match state.last_good() {
        Some(last) => CachedReply {
            text: last.display_text().to_string(),
            confidence: last.confidence,
            reason,
        },
        None => CachedReply {
            text: reason.placeholder().to_string(),
            confidence: 0.0,
            reason,
        },
    }
}

pub struct TranslationPipeline {
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    admission: AdmissionController,
    vocabulary: Arc<VocabularyCache>,
    shortlist: Arc<ShortlistEngine>,
    classifier: FinalClassifier,
    sessions: SessionRegistry,
    /// Per-key state for the one-shot endpoint, separate from live connections.
    keyed: SessionRegistry,
    translations: Arc<dyn TranslationRepository>,
}

impl TranslationPipeline {
    pub fn new(
        config: PipelineConfig,
        clock: Arc<dyn Clock>,
        inference: InferenceClient,
        vocabulary: Arc<VocabularyCache>,
        translations: Arc<dyn TranslationRepository>,
    ) -> Result<Self, PipelineError> {
        let prompts = Arc::new(PromptRenderer::new()?);
        let shortlist = Arc::new(ShortlistEngine::new(
            inference.clone(),
            prompts.clone(),
            clock.clone(),
            &config,
        ));
        Ok(Self {
            admission: AdmissionController::from_config(&config),
            classifier: FinalClassifier::new(inference, prompts),
            sessions: SessionRegistry::new(config.max_frame_history, config.max_conversation_history),
            keyed: SessionRegistry::new(config.max_frame_history, config.max_conversation_history),
            config,
            clock,
            vocabulary,
            shortlist,
            translations,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn keyed_requests(&self) -> &SessionRegistry {
        &self.keyed
    }

    pub fn vocabulary(&self) -> &Arc<VocabularyCache> {
        &self.vocabulary
    }

    pub fn shortlist(&self) -> &Arc<ShortlistEngine> {
        &self.shortlist
    }

    pub fn translations(&self) -> &Arc<dyn TranslationRepository> {
        &self.translations
    }

    pub async fn open_session(&self) -> SessionHandle {
        let handle = self.sessions.open().await;
        info!(session_id = handle.id(), "session opened");
        handle
    }

    /// Stops admission for the session; an in-flight result will be discarded.
    pub async fn close_session(&self, handle: &SessionHandle) {
        self.sessions.remove(handle.id()).await;
        self.shortlist.forget(handle.id());
        info!(session_id = handle.id(), "session closed");
    }

    /// Runs admission for one incoming frame.
    pub fn evaluate(&self, session: &SessionHandle, frame: &Frame) -> FrameDecision {
        let now = self.clock.now();
        let mut state = session.lock();

        match self.admission.decide(&mut state, frame, now) {
            AdmissionDecision::Admit => {
                debug!(session_id = session.id(), bytes = frame.len(), "frame admitted");
                FrameDecision::Dispatch
            }
            AdmissionDecision::Drop => FrameDecision::Drop,
            AdmissionDecision::ServeCached(reason) => {
                debug!(session_id = session.id(), %reason, "serving cached result");
                FrameDecision::Reply(Reply::Cached(cached_reply(&state, reason)))
            }
        }
    }

    /// Classifies an admitted frame and updates the session.
    ///
    /// Returns `None` when the session was closed while the call was running.
    pub async fn dispatch(&self, session: &SessionHandle, frame: Frame) -> Option<Reply> {
        let (mut frames, context, context_signs) = {
            let state = session.lock();
            let context_signs: Vec<String> = state.conversation().iter().map(|c| c.sign.clone()).collect();
            (
                state.previous_frames(self.config.previous_frames_per_call),
                state.recent_context(self.config.context_window),
                context_signs,
            )
        };
        frames.push(frame.clone());

        let outcome = self
            .run_stages(Some(session.id()), &frames, &context, &context_signs)
            .await;

        if !self.sessions.is_live(session).await {
            session.lock().end_inference();
            debug!(session_id = session.id(), "session gone, discarding result");
            return None;
        }

        let now = self.clock.now();
        let mut state = session.lock();
        state.end_inference();

        let reply = match outcome {
            Ok(result) => {
                info!(
                    session_id = session.id(),
                    sign = result.detected_sign.as_deref().unwrap_or("-"),
                    confidence = result.confidence,
                    "sign classified"
                );
                self.persist(session.id(), result.clone(), frames.len());
                state.record_success(frame, result.clone());
                Reply::Result(result)
            }
            Err(e) if e.is_fatal() => {
                error!(session_id = session.id(), error = %e, "daily quota exhausted, halting session");
                state.halt();
                Reply::Error {
                    message: DAILY_QUOTA_MESSAGE.to_string(),
                    fatal: true,
                }
            }
            Err(e) if e.is_transient() => {
                let until = state.enter_cooldown(now, self.config.cooldown());
                warn!(
                    session_id = session.id(),
                    error = %e,
                    cooldown_ms = until.saturating_duration_since(now).as_millis() as u64,
                    "oracle throttled, entering cooldown"
                );
                Reply::Cached(cached_reply(&state, CachedReason::Throttled))
            }
            Err(e) => {
                warn!(session_id = session.id(), error = %e, "classification failed");
                Reply::Error {
                    message: e.to_string(),
                    fatal: false,
                }
            }
        };
        Some(reply)
    }

    /// One-shot classification without admission control or session state.
    ///
    /// The last frame is the current one; up to the configured number of
    /// frames before it are sent as motion context.
    pub async fn analyze(&self, frames: &[Frame]) -> Result<ClassificationResult, PipelineError> {
        if frames.is_empty() {
            return Err(SignlensError::validation("at least one frame is required").into());
        }
        let keep = (self.config.previous_frames_per_call + 1).min(frames.len());
        let frames = &frames[frames.len() - keep..];
        self.run_stages(None, frames, &[], &[]).await
    }

    /// One-shot classification keyed by a client-chosen session id.
    ///
    /// The last frame is the current one. A frame identical to the key's
    /// previous request within the request duplicate window is answered with
    /// the key's last result (or a placeholder) and no oracle call. There is
    /// no rate limit or single-flight guard here. Results are persisted only
    /// when `session_id` is given.
    pub async fn translate(
        &self,
        session_id: Option<&str>,
        frames: &[Frame],
        context: &[ConversationEntry],
    ) -> Result<KeyedOutcome, PipelineError> {
        let Some(current) = frames.last() else {
            return Err(SignlensError::validation("imageFrame is required").into());
        };
        let key = session_id.unwrap_or(ANONYMOUS_REQUEST_KEY);
        let handle = self.keyed.get_or_open(key).await;
        let now = self.clock.now();
        let fingerprint = current.fingerprint();

        {
            let mut state = handle.lock();
            let duplicate = state.last_frame().is_some_and(|(hash, at)| {
                hash == fingerprint
                    && now.saturating_duration_since(at) < self.config.request_duplicate_ttl()
            });
            if duplicate {
                debug!(request_key = key, "unchanged frame, skipping oracle");
                let result = state
                    .last_good()
                    .cloned()
                    .unwrap_or_else(ClassificationResult::skipped_duplicate);
                return Ok(KeyedOutcome::Skipped(result));
            }
            // Recorded before the call so a retry of a failing frame is skipped too.
            state.begin_inference(now, fingerprint);
        }
        self.prune_keyed().await;

        let keep = (self.config.previous_frames_per_call + 1).min(frames.len());
        let frames = &frames[frames.len() - keep..];
        let context_signs: Vec<String> = context.iter().map(|c| c.sign.clone()).collect();
        let window = context.len().saturating_sub(self.config.context_window);
        let stage_a_key = format!("request:{key}");

        let outcome = self
            .run_stages(Some(&stage_a_key), frames, &context[window..], &context_signs)
            .await;

        let mut state = handle.lock();
        state.end_inference();
        let result = outcome?;
        info!(
            request_key = key,
            sign = result.detected_sign.as_deref().unwrap_or("-"),
            confidence = result.confidence,
            "sign classified"
        );
        if let Some(session_id) = session_id {
            self.persist(session_id, result.clone(), frames.len());
        }
        state.record_success(current.clone(), result.clone());
        Ok(KeyedOutcome::Classified(result))
    }

    /// Forgets keyed request state older than the duplicate window once too
    /// many keys are tracked.
    async fn prune_keyed(&self) {
        if self.keyed.len().await <= self.config.max_request_keys {
            return;
        }
        let now = self.clock.now();
        let ttl = self.config.request_duplicate_ttl();
        let removed = self
            .keyed
            .retain(|state| {
                state
                    .last_frame()
                    .is_some_and(|(_, at)| now.saturating_duration_since(at) < ttl)
            })
            .await;
        debug!(removed, "pruned keyed request state");
    }

    async fn run_stages(
        &self,
        session_key: Option<&str>,
        frames: &[Frame],
        context: &[ConversationEntry],
        context_signs: &[String],
    ) -> Result<ClassificationResult, PipelineError> {
        let vocabulary = self.vocabulary.get().await?;
        if vocabulary.is_empty() {
            return Ok(ClassificationResult::empty_shortlist());
        }

        let features = self.shortlist.features(session_key, frames, context_signs).await?;
        let candidates = self.shortlist.shortlist(&vocabulary, &features);
        let mut result = self.classifier.classify(&candidates, context, frames).await?;
        if self.shortlist.stage_a_enabled() {
            result.stage_a = Some(features);
        }
        Ok(result)
    }

    fn persist(&self, session_id: &str, result: ClassificationResult, frame_count: usize) {
        let repository = Arc::clone(&self.translations);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let judge = JudgeEntry::new(&result, false);
            let record = TranslationRecord::new(result, frame_count);
            if let Err(e) = repository.append(&session_id, record).await {
                warn!(session_id = %session_id, error = %e, "failed to persist translation");
            }
            if let Err(e) = repository.append_judge(&session_id, judge).await {
                warn!(session_id = %session_id, error = %e, "failed to persist judge entry");
            }
        });
    }
}
