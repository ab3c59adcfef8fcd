//! Per-connection session state.

use super::history::BoundedHistory;
use crate::frame::Frame;
use crate::translation::ClassificationResult;
use std::time::{Duration, Instant};

/// One previously detected sign, used as conversational context.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub sign: String,
    pub confidence: f64,
}

/// Rolling state owned by one streaming connection.
///
/// Created when the connection opens and discarded when it closes; nothing
/// here is persisted.
#[derive(Debug)]
pub struct SessionState {
    id: String,
    frame_history: BoundedHistory<Frame>,
    conversation: BoundedHistory<ConversationEntry>,
    last_good: Option<ClassificationResult>,
    last_frame: Option<(String, Instant)>,
    last_inference_at: Option<Instant>,
    cooldown_until: Option<Instant>,
    in_flight: bool,
    halted: bool,
}

impl SessionState {
    pub fn new(id: impl Into<String>, max_frames: usize, max_conversation: usize) -> Self {
        Self {
            id: id.into(),
            frame_history: BoundedHistory::new(max_frames),
            conversation: BoundedHistory::new(max_conversation),
            last_good: None,
            last_frame: None,
            last_inference_at: None,
            cooldown_until: None,
            in_flight: false,
            halted: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn frame_history(&self) -> &BoundedHistory<Frame> {
        &self.frame_history
    }

    pub fn conversation(&self) -> &BoundedHistory<ConversationEntry> {
        &self.conversation
    }

    pub fn last_good(&self) -> Option<&ClassificationResult> {
        self.last_good.as_ref()
    }

    pub fn last_frame(&self) -> Option<(&str, Instant)> {
        self.last_frame.as_ref().map(|(hash, at)| (hash.as_str(), *at))
    }

    pub fn last_inference_at(&self) -> Option<Instant> {
        self.last_inference_at
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// True once a deployment-wide quota failure was seen; no further
    /// oracle calls are made for this session.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Marks a frame as admitted to inference.
    pub fn begin_inference(&mut self, now: Instant, fingerprint: String) {
        self.in_flight = true;
        self.last_inference_at = Some(now);
        self.last_frame = Some((fingerprint, now));
    }

    /// Clears the single-flight flag.
    pub fn end_inference(&mut self) {
        self.in_flight = false;
    }

    /// Records a completed classification for `frame`.
    pub fn record_success(&mut self, frame: Frame, result: ClassificationResult) {
        self.frame_history.push(frame);
        if let Some(sign) = result.detected_sign.as_ref() {
            self.conversation.push(ConversationEntry {
                sign: sign.clone(),
                confidence: result.confidence,
            });
        }
        self.last_good = Some(result);
    }

    /// Extends the cooldown window to at least `now + window`.
    ///
    /// The deadline never moves backwards.
    pub fn enter_cooldown(&mut self, now: Instant, window: Duration) -> Instant {
        let candidate = now + window;
        let until = match self.cooldown_until {
            Some(existing) if existing > candidate => existing,
            _ => candidate,
        };
        self.cooldown_until = Some(until);
        until
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    /// The newest `n` frames from history, oldest first.
    pub fn previous_frames(&self, n: usize) -> Vec<Frame> {
        self.frame_history.latest(n)
    }

    /// The newest `n` conversation entries, oldest first.
    pub fn recent_context(&self, n: usize) -> Vec<ConversationEntry> {
        self.conversation.latest(n)
    }
}
