//! Session store on top of any [`KeyValueStore`].
//!
//! Sessions are stored as JSON under `auth:session:{session_id}` with a TTL
//! matching `expires_at`, so the same backend that holds tokens and counters
//! (memory or `Redis`) can hold sessions too.

use crate::constants::key_prefixes;
use crate::error::{AuthError, Result};
use crate::providers::{KeyValueStore, Lookup, SessionStore};
use crate::state::{Session, SessionId};
use chrono::Duration;
use passlink_core::environment::{Clock, SystemClock};

/// [`SessionStore`] persisted in a [`KeyValueStore`].
///
/// # Example
///
/// ```
/// use passlink_auth::stores::{MemoryStore, StoreSessionStore};
///
/// let sessions = StoreSessionStore::new(MemoryStore::default());
/// ```
#[derive(Debug, Clone)]
pub struct StoreSessionStore<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: KeyValueStore> StoreSessionStore<S, SystemClock> {
    /// Create a session store using the wall clock.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: KeyValueStore, C: Clock> StoreSessionStore<S, C> {
    /// Create a session store that reads time from `clock`.
    #[must_use]
    pub const fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    fn session_key(session_id: SessionId) -> String {
        format!("{}:{session_id}", key_prefixes::SESSION)
    }

    fn remaining(&self, session: &Session) -> Result<Duration> {
        let remaining = session.expires_at - self.clock.now();
        if remaining <= Duration::zero() {
            return Err(AuthError::SessionNotFound);
        }
        Ok(remaining)
    }
}

impl<S: KeyValueStore, C: Clock> SessionStore for StoreSessionStore<S, C> {
    async fn create_session(&self, session: &Session, ttl: Duration) -> Result<()> {
        let key = Self::session_key(session.session_id);

        // Reject a known session ID (session fixation)
        if self.store.get(&key).await?.is_found() {
            return Err(AuthError::InternalError(
                "Session ID already exists".to_string(),
            ));
        }

        self.store.put(&key, serde_json::to_value(session)?, ttl).await?;

        tracing::info!(
            session_id = %session.session_id,
            login_method = %session.login_method,
            impersonated = session.is_impersonated(),
            ttl_seconds = ttl.num_seconds(),
            "Created session"
        );

        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        match self.store.get(&Self::session_key(session_id)).await? {
            Lookup::Found(value) => {
                let session: Session = serde_json::from_value(value)?;
                if session.expires_at < self.clock.now() {
                    return Err(AuthError::SessionNotFound);
                }
                Ok(session)
            }
            Lookup::NotFoundOrExpired => Err(AuthError::SessionNotFound),
        }
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        let existing = self.get_session(session.session_id).await?;

        if existing.user != session.user || existing.ip_address != session.ip_address {
            tracing::error!(
                session_id = %session.session_id,
                "Attempt to change immutable session fields"
            );
            return Err(AuthError::InternalError(
                "Cannot change session user or ip_address (immutable)".to_string(),
            ));
        }

        let ttl = self.remaining(session)?;
        self.store
            .put(
                &Self::session_key(session.session_id),
                serde_json::to_value(session)?,
                ttl,
            )
            .await?;

        tracing::debug!(
            session_id = %session.session_id,
            impersonated = session.is_impersonated(),
            "Updated session"
        );

        Ok(())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        self.store.delete(&Self::session_key(session_id)).await?;

        tracing::info!(session_id = %session_id, "Deleted session");

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::{Impersonation, SessionUser, UserId};
    use crate::stores::MemoryStore;
    use passlink_testing::{FixedClock, test_clock};
    use std::net::{IpAddr, Ipv4Addr};

    fn session(clock: &FixedClock) -> Session {
        let now = clock.now();
        Session {
            session_id: SessionId::new(),
            user: Some(SessionUser {
                user_id: UserId::new(),
                email: "a@x.com".into(),
                name: Some("Ada".into()),
            }),
            impersonation: None,
            login_method: "magic_link".into(),
            created_at: now,
            expires_at: now + Duration::hours(24),
            ip_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            user_agent: None,
        }
    }

    fn store(clock: &FixedClock) -> StoreSessionStore<MemoryStore<FixedClock>, FixedClock> {
        StoreSessionStore::with_clock(MemoryStore::new(clock.clone()), clock.clone())
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let clock = test_clock();
        let sessions = store(&clock);
        let session = session(&clock);

        sessions.create_session(&session, Duration::hours(24)).await.unwrap();
        assert_eq!(sessions.get_session(session.session_id).await.unwrap(), session);

        sessions.delete_session(session.session_id).await.unwrap();
        assert_eq!(
            sessions.get_session(session.session_id).await,
            Err(AuthError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn test_duplicate_session_id_rejected() {
        let clock = test_clock();
        let sessions = store(&clock);
        let session = session(&clock);

        sessions.create_session(&session, Duration::hours(1)).await.unwrap();
        assert!(sessions.create_session(&session, Duration::hours(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_keeps_user_and_sets_impersonation() {
        let clock = test_clock();
        let sessions = store(&clock);
        let mut session = session(&clock);
        sessions.create_session(&session, Duration::hours(24)).await.unwrap();

        session.impersonation = Some(Impersonation {
            subject_id: "uid-9".into(),
            display_name: "Corner Bistro".into(),
            impersonated_at: clock.now(),
        });
        sessions.update_session(&session).await.unwrap();
        assert!(sessions.get_session(session.session_id).await.unwrap().is_impersonated());

        session.user = None;
        assert!(sessions.update_session(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_session_expires_with_clock() {
        let clock = test_clock();
        let sessions = store(&clock);
        let session = session(&clock);
        sessions.create_session(&session, Duration::hours(24)).await.unwrap();

        clock.advance(Duration::hours(25));

        assert_eq!(
            sessions.get_session(session.session_id).await,
            Err(AuthError::SessionNotFound)
        );
    }
}
