//! Oracle calls with credential rotation.

use crate::credential_pool::CredentialPool;
use crate::response_parser::ParseError;
use signlens_core::Frame;
use signlens_core::oracle::{OracleError, OracleErrorKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Failure of one inference call, already classified for the caller.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// Deployment-wide quota is gone; rotation cannot help.
    #[error("daily quota exhausted: {0}")]
    Fatal(OracleError),
    /// Every credential was throttled; the caller should cool down.
    #[error("all {attempts} credential(s) throttled: {last}")]
    Transient { attempts: usize, last: OracleError },
    /// Any other oracle failure; not retried.
    #[error("inference failed: {0}")]
    Failed(OracleError),
    /// The oracle answered but the answer was unusable.
    #[error("malformed model response: {error}")]
    Malformed { error: ParseError, raw: String },
    /// The prompt could not be rendered.
    #[error("prompt rendering failed: {0}")]
    Prompt(String),
}

impl InferenceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn malformed(error: ParseError, raw: impl Into<String>) -> Self {
        Self::Malformed {
            error,
            raw: raw.into(),
        }
    }
}

/// Issues oracle calls through the shared [`CredentialPool`].
///
/// Throttling failures rotate to the next credential and retry, at most once
/// per credential in the pool.
#[derive(Clone)]
pub struct InferenceClient {
    pool: Arc<CredentialPool>,
}

impl InferenceClient {
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Sends one prompt with frames (oldest first) and returns the raw answer.
    pub async fn classify(&self, prompt: &str, frames: &[Frame]) -> Result<String, InferenceError> {
        let attempts = self.pool.len();
        let mut last_throttle = None;

        for attempt in 1..=attempts {
            let pooled = self.pool.current().map_err(InferenceError::Failed)?;
            debug!(attempt, credential_index = pooled.index, frames = frames.len(), "calling oracle");

            let err = match pooled.client.generate(prompt, frames).await {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };

            match err.kind() {
                OracleErrorKind::DailyQuota => {
                    error!(credential_index = pooled.index, error = %err, "daily quota exhausted");
                    return Err(InferenceError::Fatal(err));
                }
                OracleErrorKind::RateLimited => {
                    let next = self.pool.rotate(pooled.index);
                    warn!(
                        attempt,
                        credential_index = pooled.index,
                        next_index = next,
                        "oracle throttled, rotating credential"
                    );
                    last_throttle = Some(err);
                }
                OracleErrorKind::Other => {
                    warn!(credential_index = pooled.index, error = %err, "oracle call failed");
                    return Err(InferenceError::Failed(err));
                }
            }
        }

        Err(InferenceError::Transient {
            attempts,
            last: last_throttle.unwrap_or_else(OracleError::rate_limited),
        })
    }
}
