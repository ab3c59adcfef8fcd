//! Process-wide credential rotation.
//!
//! The pool owns the ordered credential list, a rotation cursor, and one
//! cached oracle client per credential. It is shared by every session, so a
//! quota event seen by one session moves the cursor for all of them.

use signlens_core::error::{Result, SignlensError};
use signlens_core::oracle::{Credential, OracleClient, OracleClientFactory, OracleError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A client handed out by [`CredentialPool::current`].
#[derive(Clone)]
pub struct PooledClient {
    /// Position of the credential in the pool; safe to log.
    pub index: usize,
    pub client: Arc<dyn OracleClient>,
}

struct PoolState {
    cursor: usize,
    clients: HashMap<usize, Arc<dyn OracleClient>>,
}

/// Ordered credentials with round-robin rotation and per-credential client reuse.
pub struct CredentialPool {
    credentials: Vec<Credential>,
    factory: Arc<dyn OracleClientFactory>,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    /// Creates a pool; at least one credential is required.
    pub fn new(credentials: Vec<Credential>, factory: Arc<dyn OracleClientFactory>) -> Result<Self> {
        if credentials.is_empty() {
            return Err(SignlensError::config(
                "at least one oracle credential is required",
            ));
        }
        Ok(Self {
            credentials,
            factory,
            state: Mutex::new(PoolState {
                cursor: 0,
                clients: HashMap::new(),
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Index of the credential the next call will use.
    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // State stays consistent across a panic: every mutation is a single assignment.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the client for the current credential, creating it on first use.
    pub fn current(&self) -> std::result::Result<PooledClient, OracleError> {
        let mut state = self.lock();
        let index = state.cursor;
        if let Some(client) = state.clients.get(&index) {
            return Ok(PooledClient {
                index,
                client: client.clone(),
            });
        }

        let client = self.factory.create(&self.credentials[index])?;
        state.clients.insert(index, client.clone());
        Ok(PooledClient { index, client })
    }

    /// Advances past credential `observed`, wrapping around.
    ///
    /// If another caller already rotated away from `observed`, the cursor is
    /// left where it is so that one exhausted credential costs one step.
    /// Returns the cursor after the call.
    pub fn rotate(&self, observed: usize) -> usize {
        let mut state = self.lock();
        if state.cursor == observed {
            state.cursor = (observed + 1) % self.credentials.len();
        }
        state.cursor
    }
}
