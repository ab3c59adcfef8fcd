//! End-to-end behaviour of the streaming pipeline against a scripted oracle.

use async_trait::async_trait;
use signlens_application::{
    CachedReason, FrameDecision, KeyedOutcome, PipelineError, Reply, TranslationPipeline, VocabularyCache,
};
use signlens_core::config::PipelineConfig;
use signlens_core::oracle::{Credential, OracleClient, OracleClientFactory, OracleError};
use signlens_core::session::ConversationEntry;
use signlens_core::translation::{
    ClassificationResult, JudgeEntry, TranslationRecord, TranslationRepository, TranslationSession,
};
use signlens_core::vocabulary::{VocabularyEntry, VocabularyRepository};
use signlens_core::{Frame, ManualClock, Result as CoreResult, SignlensError};
use signlens_interaction::{CredentialPool, InferenceClient};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

const HELLO: &str = r#"{"detectedSign": "hello", "confidence": 0.9, "reasoning": "wave at head level"}"#;
const FEATURES_HELLO: &str = r#"{"handShapeKeywords": [], "candidateLabels": ["hello"], "confidence": 0.8}"#;

#[derive(Default)]
struct ScriptedOracle {
    stage_a_reply: Mutex<String>,
    stage_c_replies: Mutex<VecDeque<Result<String, OracleError>>>,
    stage_a_calls: AtomicUsize,
    stage_c_calls: AtomicUsize,
    last_prompt: Mutex<String>,
    last_frame_count: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedOracle {
    fn stage_c(&self, reply: Result<&str, OracleError>) {
        self.stage_c_replies
            .lock()
            .unwrap()
            .push_back(reply.map(str::to_string));
    }

    fn stage_c_calls(&self) -> usize {
        self.stage_c_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OracleClient for ScriptedOracle {
    async fn generate(&self, prompt: &str, frames: &[Frame]) -> Result<String, OracleError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }

        self.last_frame_count.store(frames.len(), Ordering::SeqCst);
        let reply = if prompt.contains("handShapeKeywords") {
            self.stage_a_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.stage_a_reply.lock().unwrap().clone())
        } else {
            self.stage_c_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            self.stage_c_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HELLO.to_string()))
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

struct SharedFactory(Arc<ScriptedOracle>);

impl OracleClientFactory for SharedFactory {
    fn create(&self, _credential: &Credential) -> Result<Arc<dyn OracleClient>, OracleError> {
        Ok(self.0.clone())
    }
}

struct StaticVocabulary(Vec<VocabularyEntry>);

#[async_trait]
impl VocabularyRepository for StaticVocabulary {
    async fn fetch_all(&self) -> CoreResult<Vec<VocabularyEntry>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct MemoryStore {
    sessions: Mutex<HashMap<String, TranslationSession>>,
    failing: AtomicBool,
}

#[async_trait]
impl TranslationRepository for MemoryStore {
    async fn create_session(&self, session_id: &str) -> CoreResult<TranslationSession> {
        let mut sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .entry(session_id.to_string())
            .or_insert_with(|| TranslationSession::new(session_id))
            .clone())
    }

    async fn append(&self, session_id: &str, record: TranslationRecord) -> CoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SignlensError::data_access("store offline"));
        }
        self.sessions
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert_with(|| TranslationSession::new(session_id))
            .push(record);
        Ok(())
    }

    async fn append_judge(&self, session_id: &str, entry: JudgeEntry) -> CoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SignlensError::data_access("store offline"));
        }
        self.sessions
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert_with(|| TranslationSession::new(session_id))
            .push_judge(entry);
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> CoreResult<Option<TranslationSession>> {
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }
}

struct Harness {
    pipeline: Arc<TranslationPipeline>,
    oracle: Arc<ScriptedOracle>,
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
}

fn vocabulary() -> Vec<VocabularyEntry> {
    vec![
        VocabularyEntry::new("hello", "Flat hand salutes outward from the forehead")
            .with_hand_shape("flat hand")
            .with_location("forehead"),
        VocabularyEntry::new("goodbye", "Open hand waves side to side")
            .with_hand_shape("open palm")
            .with_motion("side-to-side wave"),
        VocabularyEntry::new("mother", "Thumb of open hand taps the chin")
            .with_location("chin")
            .with_motion("tap"),
    ]
}

fn no_stage_a() -> PipelineConfig {
    PipelineConfig {
        stage_a_enabled: false,
        ..PipelineConfig::default()
    }
}

fn harness(vocabulary: Vec<VocabularyEntry>, config: PipelineConfig) -> Harness {
    let oracle = Arc::new(ScriptedOracle::default());
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(MemoryStore::default());

    let pool = CredentialPool::new(vec![Credential::new("only-key")], Arc::new(SharedFactory(oracle.clone()))).unwrap();
    let cache = Arc::new(VocabularyCache::new(
        Arc::new(StaticVocabulary(vocabulary)),
        clock.clone(),
        Duration::from_secs(30),
    ));
    let pipeline = TranslationPipeline::new(
        config,
        clock.clone(),
        InferenceClient::new(Arc::new(pool)),
        cache,
        store.clone(),
    )
    .unwrap();

    Harness {
        pipeline: Arc::new(pipeline),
        oracle,
        clock,
        store,
    }
}

fn frame(content: &[u8]) -> Frame {
    Frame::new(content.to_vec(), "image/jpeg")
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn cached(decision: FrameDecision) -> (String, f64, CachedReason) {
    match decision {
        FrameDecision::Reply(Reply::Cached(reply)) => (reply.text, reply.confidence, reply.reason),
        other => panic!("expected cached reply, got {other:?}"),
    }
}

/// Waits for the fire-and-forget writes until `ready` holds.
async fn stored_session(h: &Harness, id: &str, ready: impl Fn(&TranslationSession) -> bool) -> TranslationSession {
    for _ in 0..100 {
        if let Some(stored) = h.store.find_session(id).await.unwrap()
            && ready(&stored)
        {
            return stored;
        }
        tokio::task::yield_now().await;
    }
    panic!("session {id} never reached the expected state");
}

async fn admit_and_dispatch(h: &Harness, session: &signlens_application::SessionHandle, f: Frame) -> Reply {
    assert_eq!(h.pipeline.evaluate(session, &f), FrameDecision::Dispatch);
    h.pipeline.dispatch(session, f).await.expect("session is live")
}

#[tokio::test]
async fn test_duplicate_frame_served_from_cache() {
    let h = harness(vocabulary(), no_stage_a());
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;
    match reply {
        Reply::Result(result) => {
            assert_eq!(result.detected_sign.as_deref(), Some("hello"));
            assert_eq!(result.confidence, 0.9);
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    h.clock.set_offset(ms(1_000));
    let (text, confidence, reason) = cached(h.pipeline.evaluate(&session, &frame(b"F1")));

    assert_eq!(text, "hello");
    assert_eq!(confidence, 0.9);
    assert_eq!(reason, CachedReason::Duplicate);
    assert_eq!(h.oracle.stage_c_calls(), 1);
    assert!(session.lock().last_good().unwrap().stage_a.is_none());
}

#[tokio::test]
async fn test_fast_distinct_frames_are_rate_limited() {
    let h = harness(vocabulary(), no_stage_a());
    let session = h.pipeline.open_session().await;

    admit_and_dispatch(&h, &session, frame(b"F1")).await;

    for (i, at) in [500u64, 1_200, 2_499].into_iter().enumerate() {
        h.clock.set_offset(ms(at));
        let (text, _, reason) = cached(h.pipeline.evaluate(&session, &frame(&[b'x', i as u8])));
        assert_eq!(text, "hello");
        assert_eq!(reason, CachedReason::RateLimited);
    }
    assert_eq!(h.oracle.stage_c_calls(), 1);

    h.clock.set_offset(ms(2_600));
    assert_eq!(h.pipeline.evaluate(&session, &frame(b"F5")), FrameDecision::Dispatch);
}

#[tokio::test]
async fn test_rate_limit_error_enters_cooldown() {
    let h = harness(vocabulary(), no_stage_a());
    h.oracle.stage_c(Err(OracleError::rate_limited()));
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;
    match reply {
        Reply::Cached(cached) => {
            assert!(cached.throttled());
            assert_eq!(cached.text, CachedReason::Throttled.placeholder());
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(session.lock().cooldown_until(), Some(h.clock.origin() + ms(20_000)));
    assert!(!session.lock().is_in_flight());

    h.clock.set_offset(ms(5_000));
    let (_, _, reason) = cached(h.pipeline.evaluate(&session, &frame(b"F2")));
    assert_eq!(reason, CachedReason::Throttled);

    h.clock.set_offset(ms(21_000));
    assert_eq!(h.pipeline.evaluate(&session, &frame(b"F3")), FrameDecision::Dispatch);
}

#[tokio::test]
async fn test_cooldown_keeps_last_good_result_visible() {
    let h = harness(vocabulary(), no_stage_a());
    let session = h.pipeline.open_session().await;

    admit_and_dispatch(&h, &session, frame(b"F1")).await;

    h.oracle.stage_c(Err(OracleError::with_status(429, "Resource has been exhausted")));
    h.clock.set_offset(ms(3_000));
    let reply = admit_and_dispatch(&h, &session, frame(b"F2")).await;

    match reply {
        Reply::Cached(cached) => {
            assert!(cached.throttled());
            assert_eq!(cached.text, "hello");
            assert_eq!(cached.confidence, 0.9);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_daily_quota_halts_session() {
    let h = harness(vocabulary(), no_stage_a());
    h.oracle.stage_c(Err(OracleError::daily_quota()));
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;
    match reply {
        Reply::Error { fatal, .. } => assert!(fatal),
        other => panic!("unexpected reply: {other:?}"),
    }

    for at in [3_000u64, 30_000, 120_000] {
        h.clock.set_offset(ms(at));
        assert_eq!(h.pipeline.evaluate(&session, &frame(&at.to_le_bytes())), FrameDecision::Drop);
    }
    assert_eq!(h.oracle.stage_c_calls(), 1);

    // Other sessions are unaffected.
    let other = h.pipeline.open_session().await;
    assert_eq!(h.pipeline.evaluate(&other, &frame(b"G1")), FrameDecision::Dispatch);
}

#[tokio::test]
async fn test_malformed_answer_is_a_non_fatal_error() {
    let h = harness(vocabulary(), no_stage_a());
    h.oracle.stage_c(Ok("The signer appears to wave."));
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;

    match reply {
        Reply::Error { fatal, .. } => assert!(!fatal),
        other => panic!("unexpected reply: {other:?}"),
    }
    let state = session.lock();
    assert_eq!(state.cooldown_until(), None);
    assert!(state.last_good().is_none());
    assert!(state.frame_history().is_empty());
    assert!(!state.is_in_flight());
}

#[tokio::test]
async fn test_stage_a_label_puts_hello_first() {
    let h = harness(vocabulary(), PipelineConfig::default());
    *h.oracle.stage_a_reply.lock().unwrap() = FEATURES_HELLO.to_string();
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;

    match reply {
        Reply::Result(result) => {
            assert_eq!(result.candidates.first().map(String::as_str), Some("hello"));
            assert_eq!(result.detected_sign.as_deref(), Some("hello"));
            let features = result.stage_a.expect("stage A features attached");
            assert_eq!(features.candidate_labels, vec!["hello"]);
            assert_eq!(features.confidence, 0.8);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(h.oracle.stage_a_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shortlist_falls_back_when_features_are_empty() {
    let h = harness(vocabulary(), no_stage_a());
    h.oracle.stage_c(Ok(r#"{"detectedSign": "null", "confidence": 0.1, "reasoning": "blurry"}"#));
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;

    match reply {
        Reply::Result(result) => {
            assert_eq!(result.candidates, vec!["hello", "goodbye", "mother"]);
            assert_eq!(result.detected_sign, None);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    // A null detection is not added to the conversation.
    assert!(session.lock().conversation().is_empty());
    assert_eq!(session.lock().frame_history().len(), 1);
}

#[tokio::test]
async fn test_empty_vocabulary_skips_oracle() {
    let h = harness(Vec::new(), PipelineConfig::default());
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;

    match reply {
        Reply::Result(result) => {
            assert_eq!(result.detected_sign, None);
            assert_eq!(result.reasoning, "No candidate signs available (shortlist empty).");
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(h.oracle.stage_a_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.oracle.stage_c_calls(), 0);
}

#[tokio::test]
async fn test_context_and_previous_frames_are_sent() {
    let h = harness(vocabulary(), no_stage_a());
    let session = h.pipeline.open_session().await;

    for (i, name) in [b"F1", b"F2", b"F3", b"F4"].into_iter().enumerate() {
        h.clock.set_offset(ms(3_000 * i as u64));
        admit_and_dispatch(&h, &session, frame(name)).await;
    }

    // Current frame plus two previous ones.
    assert_eq!(h.oracle.last_frame_count.load(Ordering::SeqCst), 3);
    let prompt = h.oracle.last_prompt.lock().unwrap().clone();
    assert!(prompt.contains(r#"1. "hello" (90% confidence) → 2. "hello" (90% confidence) → 3. "hello" (90% confidence)"#));
}

#[tokio::test]
async fn test_frame_history_stays_bounded() {
    let config = PipelineConfig {
        stage_a_enabled: false,
        max_frame_history: 3,
        max_conversation_history: 2,
        ..PipelineConfig::default()
    };
    let h = harness(vocabulary(), config);
    let session = h.pipeline.open_session().await;

    for i in 0..10u64 {
        h.clock.set_offset(ms(3_000 * i));
        admit_and_dispatch(&h, &session, frame(&i.to_le_bytes())).await;
        let state = session.lock();
        assert!(state.frame_history().len() <= 3);
        assert!(state.conversation().len() <= 2);
    }
}

#[tokio::test]
async fn test_single_call_in_flight_per_session() {
    let h = harness(vocabulary(), no_stage_a());
    let gate = Arc::new(Semaphore::new(0));
    *h.oracle.gate.lock().unwrap() = Some(gate.clone());
    let session = h.pipeline.open_session().await;

    let first = frame(b"F1");
    assert_eq!(h.pipeline.evaluate(&session, &first), FrameDecision::Dispatch);
    let task = {
        let pipeline = h.pipeline.clone();
        let session = session.clone();
        tokio::spawn(async move { pipeline.dispatch(&session, first).await })
    };
    while h.oracle.active.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // Past the rate-limit window, distinct content: still dropped while in flight.
    h.clock.set_offset(ms(5_000));
    assert_eq!(h.pipeline.evaluate(&session, &frame(b"F2")), FrameDecision::Drop);
    assert_eq!(h.pipeline.evaluate(&session, &frame(b"F3")), FrameDecision::Drop);

    gate.add_permits(10);
    let reply = task.await.unwrap();
    assert!(matches!(reply, Some(Reply::Result(_))));
    assert_eq!(h.oracle.max_active.load(Ordering::SeqCst), 1);

    // The newest pending frame is admitted once the call resolves.
    assert_eq!(h.pipeline.evaluate(&session, &frame(b"F3")), FrameDecision::Dispatch);
}

#[tokio::test]
async fn test_result_discarded_after_close() {
    let h = harness(vocabulary(), no_stage_a());
    let gate = Arc::new(Semaphore::new(0));
    *h.oracle.gate.lock().unwrap() = Some(gate.clone());
    let session = h.pipeline.open_session().await;

    let f = frame(b"F1");
    assert_eq!(h.pipeline.evaluate(&session, &f), FrameDecision::Dispatch);
    let task = {
        let pipeline = h.pipeline.clone();
        let session = session.clone();
        tokio::spawn(async move { pipeline.dispatch(&session, f).await })
    };
    while h.oracle.active.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    h.pipeline.close_session(&session).await;
    gate.add_permits(10);

    assert_eq!(task.await.unwrap(), None);
    assert!(session.lock().last_good().is_none());
    assert!(h.pipeline.sessions().is_empty().await);
}

#[tokio::test]
async fn test_results_are_persisted() {
    let h = harness(vocabulary(), no_stage_a());
    let session = h.pipeline.open_session().await;

    admit_and_dispatch(&h, &session, frame(b"F1")).await;

    let stored = stored_session(&h, session.id(), |s| !s.translations.is_empty()).await;
    assert_eq!(stored.translations.len(), 1);
    assert_eq!(stored.translations[0].frame_count, 1);
    assert_eq!(stored.translations[0].result.detected_sign.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_persistence_failure_does_not_reach_the_client() {
    let h = harness(vocabulary(), no_stage_a());
    h.store.failing.store(true, Ordering::SeqCst);
    let session = h.pipeline.open_session().await;

    let reply = admit_and_dispatch(&h, &session, frame(b"F1")).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(matches!(reply, Reply::Result(_)));
    assert!(session.lock().last_good().is_some());
}

#[tokio::test]
async fn test_one_shot_analysis() {
    let h = harness(vocabulary(), no_stage_a());

    let err = h.pipeline.analyze(&[]).await.unwrap_err();
    assert!(matches!(err, PipelineError::Domain(ref e) if e.is_validation()));

    let frames: Vec<Frame> = (0..5u8).map(|i| frame(&[i])).collect();
    let result = h.pipeline.analyze(&frames).await.unwrap();

    assert_eq!(result.detected_sign.as_deref(), Some("hello"));
    assert_eq!(h.oracle.last_frame_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_one_shot_transient_error_is_classified() {
    let h = harness(vocabulary(), no_stage_a());
    h.oracle.stage_c(Err(OracleError::rate_limited()));

    let err = h.pipeline.analyze(&[frame(b"F1")]).await.unwrap_err();

    assert!(err.is_transient());
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_judge_trail_follows_each_result() {
    let h = harness(vocabulary(), no_stage_a());
    let session = h.pipeline.open_session().await;

    admit_and_dispatch(&h, &session, frame(b"F1")).await;

    let stored = stored_session(&h, session.id(), |s| !s.judge_trail.is_empty()).await;
    let entry = &stored.judge_trail[0];
    assert_eq!(entry.sign.as_deref(), Some("hello"));
    assert_eq!(entry.conf, 0.9);
    assert_eq!(entry.why, "wave at head level");
    assert_eq!(entry.candidates, vec!["hello", "goodbye", "mother"]);
    assert!(!entry.skipped);
}

#[tokio::test]
async fn test_keyed_repeat_frame_is_skipped() {
    let h = harness(vocabulary(), no_stage_a());

    let first = h.pipeline.translate(Some("client-1"), &[frame(b"F1")], &[]).await.unwrap();
    let result = match first {
        KeyedOutcome::Classified(result) => result,
        other => panic!("expected a classification, got {other:?}"),
    };
    assert_eq!(result.detected_sign.as_deref(), Some("hello"));

    h.clock.set_offset(ms(9_000));
    let again = h.pipeline.translate(Some("client-1"), &[frame(b"F1")], &[]).await.unwrap();
    assert_eq!(again, KeyedOutcome::Skipped(result));
    assert_eq!(h.oracle.stage_c_calls(), 1);

    // Another key, or the same key past the window, reaches the oracle.
    h.pipeline.translate(Some("client-2"), &[frame(b"F1")], &[]).await.unwrap();
    h.clock.set_offset(ms(19_500));
    let late = h.pipeline.translate(Some("client-1"), &[frame(b"F1")], &[]).await.unwrap();
    assert!(matches!(late, KeyedOutcome::Classified(_)));
    assert_eq!(h.oracle.stage_c_calls(), 3);
}

#[tokio::test]
async fn test_keyed_repeat_after_failure_gets_placeholder() {
    let h = harness(vocabulary(), no_stage_a());
    h.oracle.stage_c(Err(OracleError::new("upstream exploded")));

    let err = h.pipeline.translate(None, &[frame(b"F1")], &[]).await.unwrap_err();
    assert!(!err.is_transient());

    let again = h.pipeline.translate(None, &[frame(b"F1")], &[]).await.unwrap();
    assert_eq!(again, KeyedOutcome::Skipped(ClassificationResult::skipped_duplicate()));
    assert_eq!(h.oracle.stage_c_calls(), 1);
    assert!(h.pipeline.keyed_requests().get("no-session").await.is_some());
}

#[tokio::test]
async fn test_keyed_request_uses_client_context() {
    let h = harness(vocabulary(), no_stage_a());
    let context: Vec<ConversationEntry> = (1..=7)
        .map(|i| ConversationEntry {
            sign: format!("s{i}"),
            confidence: 0.5,
        })
        .collect();
    let frames: Vec<Frame> = (0..4u8).map(|i| frame(&[i])).collect();

    h.pipeline.translate(None, &frames, &context).await.unwrap();

    assert_eq!(h.oracle.last_frame_count.load(Ordering::SeqCst), 3);
    let prompt = h.oracle.last_prompt.lock().unwrap().clone();
    assert!(prompt.contains(r#"1. "s3" (50% confidence)"#));
    assert!(prompt.contains(r#"5. "s7" (50% confidence)"#));
    assert!(!prompt.contains(r#""s2""#));
}

#[tokio::test]
async fn test_keyed_persistence_needs_session_id() {
    let h = harness(vocabulary(), no_stage_a());

    h.pipeline.translate(None, &[frame(b"F1")], &[]).await.unwrap();
    h.pipeline.translate(Some("stored-1"), &[frame(b"F2")], &[]).await.unwrap();

    let stored = stored_session(&h, "stored-1", |s| !s.judge_trail.is_empty()).await;
    assert_eq!(stored.translations.len(), 1);
    assert!(h.store.find_session("no-session").await.unwrap().is_none());
    assert!(h.pipeline.translate(Some("stored-1"), &[], &[]).await.is_err());
}

#[tokio::test]
async fn test_keyed_state_is_pruned_past_the_limit() {
    let config = PipelineConfig {
        stage_a_enabled: false,
        max_request_keys: 2,
        ..PipelineConfig::default()
    };
    let h = harness(vocabulary(), config);

    for key in ["a", "b", "c"] {
        h.pipeline.translate(Some(key), &[frame(b"F1")], &[]).await.unwrap();
    }
    assert_eq!(h.pipeline.keyed_requests().len().await, 3);

    h.clock.set_offset(ms(11_000));
    h.pipeline.translate(Some("d"), &[frame(b"F1")], &[]).await.unwrap();

    let keyed = h.pipeline.keyed_requests();
    assert_eq!(keyed.len().await, 1);
    assert!(keyed.get("d").await.is_some());
}
