//! External inference oracle interface.
//!
//! The oracle is a multimodal model reached over the network. The pipeline
//! only relies on its request/response contract (`generate`) and on the
//! error taxonomy exposed by [`OracleError::kind`].

use crate::frame::Frame;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Marker some deployments put in the message when the project-wide daily
/// quota is gone.
pub const DAILY_QUOTA_MARKER: &str = "GEMINI_DAILY_QUOTA_EXHAUSTED";

/// An API credential for the oracle.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    api_key: String,
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.api_key.chars().take(4).collect();
        write!(f, "Credential({visible}…)")
    }
}

/// A reusable handle bound to one credential.
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Sends `prompt` plus `frames` (oldest first, current frame last) and
    /// returns the raw text answer.
    async fn generate(&self, prompt: &str, frames: &[Frame]) -> Result<String, OracleError>;
}

/// Builds an [`OracleClient`] for a credential.
pub trait OracleClientFactory: Send + Sync {
    fn create(&self, credential: &Credential) -> Result<Arc<dyn OracleClient>, OracleError>;
}

/// How a failed oracle call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleErrorKind {
    /// Deployment-wide daily quota; rotating credentials cannot help.
    DailyQuota,
    /// Throttling or quota that may be per credential or per time window.
    RateLimited,
    /// Anything else.
    Other,
}

/// Failure reported by the oracle (or by the transport to it).
#[derive(Debug, Clone, Error)]
#[error("{}", self.describe())]
pub struct OracleError {
    pub status: Option<u16>,
    pub message: String,
    /// Quota identifier reported by the service, when any.
    pub quota_id: Option<String>,
    pub retry_after: Option<Duration>,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            quota_id: None,
            retry_after: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    pub fn with_quota_id(mut self, quota_id: impl Into<String>) -> Self {
        self.quota_id = Some(quota_id.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn daily_quota() -> Self {
        Self::with_status(429, DAILY_QUOTA_MARKER)
    }

    pub fn rate_limited() -> Self {
        Self::with_status(429, "RESOURCE_EXHAUSTED: rate limit exceeded")
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) => format!("oracle error ({status}): {}", self.message),
            None => format!("oracle error: {}", self.message),
        }
    }

    /// Classifies the failure.
    ///
    /// Daily quota wins over rate limiting: a per-day quota id also arrives
    /// as a 429.
    pub fn kind(&self) -> OracleErrorKind {
        let message = self.message.to_lowercase();
        let quota = self.quota_id.as_deref().unwrap_or("").to_lowercase();

        let daily = self.message.contains(DAILY_QUOTA_MARKER)
            || quota.contains("perday")
            || message.contains("perday")
            || message.contains("per day");
        if daily {
            return OracleErrorKind::DailyQuota;
        }

        let throttled = self.status == Some(429)
            || message.contains("429")
            || message.contains("quota")
            || message.contains("rate limit")
            || message.contains("resource has been exhausted")
            || message.contains("resource_exhausted");
        if throttled {
            return OracleErrorKind::RateLimited;
        }

        OracleErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_quota_marker() {
        assert_eq!(OracleError::daily_quota().kind(), OracleErrorKind::DailyQuota);
        let err = OracleError::new(format!("upstream said {DAILY_QUOTA_MARKER}"));
        assert_eq!(err.kind(), OracleErrorKind::DailyQuota);
    }

    #[test]
    fn test_per_day_quota_id_is_fatal_even_with_429() {
        let err = OracleError::with_status(429, "RESOURCE_EXHAUSTED: Quota exceeded")
            .with_quota_id("GenerateRequestsPerDayPerProjectPerModel-FreeTier");
        assert_eq!(err.kind(), OracleErrorKind::DailyQuota);
    }

    #[test]
    fn test_rate_limit_signals() {
        assert_eq!(OracleError::rate_limited().kind(), OracleErrorKind::RateLimited);
        assert_eq!(
            OracleError::with_status(429, "slow down").kind(),
            OracleErrorKind::RateLimited
        );
        assert_eq!(
            OracleError::new("[429 Too Many Requests]").kind(),
            OracleErrorKind::RateLimited
        );
        assert_eq!(
            OracleError::new("Resource has been exhausted (e.g. check quota).").kind(),
            OracleErrorKind::RateLimited
        );
        let per_minute = OracleError::with_status(429, "Quota exceeded")
            .with_quota_id("GenerateRequestsPerMinutePerProjectPerModel-FreeTier");
        assert_eq!(per_minute.kind(), OracleErrorKind::RateLimited);
    }

    #[test]
    fn test_other_errors() {
        assert_eq!(
            OracleError::with_status(400, "INVALID_ARGUMENT: bad image").kind(),
            OracleErrorKind::Other
        );
        assert_eq!(OracleError::new("connection reset").kind(), OracleErrorKind::Other);
    }

    #[test]
    fn test_credential_debug_hides_key() {
        let credential = Credential::new("AIzaSySecretValue");
        let debug = format!("{credential:?}");
        assert!(debug.starts_with("Credential(AIza"));
        assert!(!debug.contains("SecretValue"));
    }
}
