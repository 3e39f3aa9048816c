//! Mock session store for testing.

use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{Session, SessionId};
use chrono::Duration;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Mock session store.
///
/// Uses in-memory storage for testing. TTLs are accepted but not enforced;
/// use [`StoreSessionStore`](crate::stores::StoreSessionStore) over a memory
/// store when expiry matters.
#[derive(Debug, Clone)]
pub struct MockSessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl MockSessionStore {
    /// Create a new mock session store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get count of stored sessions (for testing).
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_failed<T>(_: PoisonError<T>) -> AuthError {
    AuthError::InternalError("Mutex lock failed".to_string())
}

impl SessionStore for MockSessionStore {
    fn create_session(
        &self,
        session: &Session,
        _ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let session = session.clone();

        async move {
            let mut sessions_guard = sessions.lock().map_err(lock_failed)?;

            if sessions_guard.contains_key(&session.session_id) {
                return Err(AuthError::StoreError(
                    "Session ID already exists".to_string(),
                ));
            }

            sessions_guard.insert(session.session_id, session);
            Ok(())
        }
    }

    fn get_session(&self, session_id: SessionId) -> impl Future<Output = Result<Session>> + Send {
        let sessions = Arc::clone(&self.sessions);

        async move {
            sessions
                .lock()
                .map_err(lock_failed)?
                .get(&session_id)
                .cloned()
                .ok_or(AuthError::SessionNotFound)
        }
    }

    fn update_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);
        let session = session.clone();

        async move {
            let mut sessions_guard = sessions.lock().map_err(lock_failed)?;

            if !sessions_guard.contains_key(&session.session_id) {
                return Err(AuthError::SessionNotFound);
            }

            sessions_guard.insert(session.session_id, session);
            Ok(())
        }
    }

    fn delete_session(&self, session_id: SessionId) -> impl Future<Output = Result<()>> + Send {
        let sessions = Arc::clone(&self.sessions);

        async move {
            sessions.lock().map_err(lock_failed)?.remove(&session_id);
            Ok(())
        }
    }
}
