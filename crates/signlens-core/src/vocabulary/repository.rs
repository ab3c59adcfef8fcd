//! Vocabulary repository trait.

use super::model::VocabularyEntry;
use crate::error::Result;
use async_trait::async_trait;

/// Read-only access to the full vocabulary.
///
/// The store is assumed eventually consistent; callers on the live path go
/// through a TTL cache instead of querying per frame.
#[async_trait]
pub trait VocabularyRepository: Send + Sync {
    /// Returns every entry, in store order.
    async fn fetch_all(&self) -> Result<Vec<VocabularyEntry>>;
}
