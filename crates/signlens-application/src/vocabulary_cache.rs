use signlens_core::Clock;
use signlens_core::error::Result;
use signlens_core::vocabulary::{VocabularyEntry, VocabularyRepository};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct Snapshot {
    fetched_at: Instant,
    entries: Arc<Vec<VocabularyEntry>>,
}

/// Time-bounded cache over a [`VocabularyRepository`].
///
/// Concurrent callers that miss the cache wait on the same refresh instead of
/// each querying the store. When a refresh fails and a previous snapshot
/// exists, the stale snapshot is served.
pub struct VocabularyCache {
    repository: Arc<dyn VocabularyRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    snapshot: Mutex<Option<Snapshot>>,
}

impl VocabularyCache {
    pub fn new(repository: Arc<dyn VocabularyRepository>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            repository,
            clock,
            ttl,
            snapshot: Mutex::new(None),
        }
    }

    /// Returns the cached vocabulary, refreshing it once the TTL has elapsed.
    pub async fn get(&self) -> Result<Arc<Vec<VocabularyEntry>>> {
        let mut snapshot = self.snapshot.lock().await;
        let now = self.clock.now();

        if let Some(current) = snapshot.as_ref() {
            if now.saturating_duration_since(current.fetched_at) < self.ttl {
                return Ok(current.entries.clone());
            }
        }

        match self.repository.fetch_all().await {
            Ok(entries) => {
                debug!(count = entries.len(), "vocabulary refreshed");
                let entries = Arc::new(entries);
                *snapshot = Some(Snapshot {
                    fetched_at: now,
                    entries: entries.clone(),
                });
                Ok(entries)
            }
            Err(e) => match snapshot.as_ref() {
                Some(stale) => {
                    warn!(error = %e, "vocabulary refresh failed, serving stale entries");
                    Ok(stale.entries.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Drops the cached snapshot so the next [`get`](Self::get) hits the store.
    pub async fn invalidate(&self) {
        *self.snapshot.lock().await = None;
    }
}
