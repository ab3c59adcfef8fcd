use signlens_core::session::SessionState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Shared handle to one live session.
///
/// The state lock is a plain mutex: it is only held for synchronous
/// bookkeeping, never across an await.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    pub fn new(state: SessionState) -> Self {
        Self {
            id: state.id().to_string(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of live sessions, one entry per open connection.
///
/// Entries are inserted on connect and removed on disconnect; an in-flight
/// call whose session is no longer registered has its result discarded.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    max_frames: usize,
    max_conversation: usize,
}

impl SessionRegistry {
    pub fn new(max_frames: usize, max_conversation: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_frames,
            max_conversation,
        }
    }

    /// Creates and registers a session with a fresh id.
    pub async fn open(&self) -> SessionHandle {
        self.open_with_id(Uuid::new_v4().to_string()).await
    }

    /// Creates and registers a session under `id`, replacing any previous one.
    pub async fn open_with_id(&self, id: String) -> SessionHandle {
        let handle = SessionHandle::new(SessionState::new(
            id.clone(),
            self.max_frames,
            self.max_conversation,
        ));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    /// Returns the session registered under `id`, creating it when missing.
    pub async fn get_or_open(&self, id: &str) -> SessionHandle {
        if let Some(handle) = self.get(id).await {
            return handle;
        }
        self.sessions
            .write()
            .await
            .entry(id.to_string())
            .or_insert_with(|| {
                SessionHandle::new(SessionState::new(id, self.max_frames, self.max_conversation))
            })
            .clone()
    }

    /// Drops every session for which `keep` returns false; returns how many went.
    pub async fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| keep(&handle.lock()));
        before - sessions.len()
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// True if `handle` is still the registered session for its id.
    pub async fn is_live(&self, handle: &SessionHandle) -> bool {
        self.sessions
            .read()
            .await
            .get(handle.id())
            .is_some_and(|current| Arc::ptr_eq(&current.state, &handle.state))
    }

    pub async fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}
