//! Translation repository trait.

use super::model::{JudgeEntry, TranslationRecord, TranslationSession};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for per-session translation history.
///
/// Writes from the live streaming path are fire-and-forget: callers log and
/// swallow failures, so implementations are free to be slow.
#[async_trait]
pub trait TranslationRepository: Send + Sync {
    /// Creates an empty session document if none exists.
    async fn create_session(&self, session_id: &str) -> Result<TranslationSession>;

    /// Appends one record to a session, creating the session when missing.
    async fn append(&self, session_id: &str, record: TranslationRecord) -> Result<()>;

    /// Appends one audit entry to a session's judge trail, creating the
    /// session when missing.
    async fn append_judge(&self, session_id: &str, entry: JudgeEntry) -> Result<()>;

    /// Loads a session's stored history.
    ///
    /// - `Ok(Some(_))`: session found
    /// - `Ok(None)`: no such session
    async fn find_session(&self, session_id: &str) -> Result<Option<TranslationSession>>;
}
