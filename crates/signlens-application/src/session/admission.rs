use signlens_core::Frame;
use signlens_core::config::PipelineConfig;
use signlens_core::session::SessionState;
use std::fmt;
use std::time::{Duration, Instant};

/// Why a frame was answered from the last good result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedReason {
    /// The session is cooling down after a throttling failure.
    Throttled,
    /// Same content as the previously admitted frame.
    Duplicate,
    /// Too soon after the previous dispatch.
    RateLimited,
}

impl CachedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachedReason::Throttled => "throttled",
            CachedReason::Duplicate => "duplicate",
            CachedReason::RateLimited => "rate-limited",
        }
    }

    /// Text shown when nothing has succeeded yet.
    pub fn placeholder(&self) -> &'static str {
        match self {
            CachedReason::Throttled => "Throttling (Gemini limit hit)…",
            CachedReason::Duplicate => "Frame unchanged…",
            CachedReason::RateLimited => "Waiting to query Gemini…",
        }
    }
}

impl fmt::Display for CachedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    ServeCached(CachedReason),
    /// Discard the frame; a call is already in flight or the session is halted.
    Drop,
    /// The frame may be dispatched; the session is now in flight.
    Admit,
}

/// Per-frame gatekeeper.
///
/// Checks run in a fixed order: cooldown, duplicate, rate limit,
/// single-flight. Only [`AdmissionDecision::Admit`] mutates the session.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    duplicate_ttl: Duration,
    min_call_interval: Duration,
}

impl AdmissionController {
    pub fn new(duplicate_ttl: Duration, min_call_interval: Duration) -> Self {
        Self {
            duplicate_ttl,
            min_call_interval,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.duplicate_ttl(), config.min_call_interval())
    }

    pub fn decide(&self, state: &mut SessionState, frame: &Frame, now: Instant) -> AdmissionDecision {
        if state.is_halted() {
            return AdmissionDecision::Drop;
        }

        if state.in_cooldown(now) {
            return AdmissionDecision::ServeCached(CachedReason::Throttled);
        }

        let fingerprint = frame.fingerprint();
        if let Some((last_hash, seen_at)) = state.last_frame() {
            if last_hash == fingerprint && now.saturating_duration_since(seen_at) < self.duplicate_ttl {
                return AdmissionDecision::ServeCached(CachedReason::Duplicate);
            }
        }

        if let Some(last) = state.last_inference_at() {
            if now.saturating_duration_since(last) < self.min_call_interval {
                return AdmissionDecision::ServeCached(CachedReason::RateLimited);
            }
        }

        if state.is_in_flight() {
            return AdmissionDecision::Drop;
        }

        state.begin_inference(now, fingerprint);
        AdmissionDecision::Admit
    }
}
