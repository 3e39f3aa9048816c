//! Session store trait.

use crate::error::Result;
use crate::state::{Session, SessionId};
use chrono::Duration;

/// Session store.
///
/// Session establishment is the last step of every successful verification.
/// The store only persists what the flows hand it.
pub trait SessionStore: Send + Sync {
    /// Create session.
    ///
    /// # Arguments
    ///
    /// - `session`: Session to create
    /// - `ttl`: Time to live (typically 24 hours)
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    fn create_session(
        &self,
        session: &Session,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Get session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Session not found or expired → `AuthError::SessionNotFound`
    fn get_session(
        &self,
        session_id: SessionId,
    ) -> impl std::future::Future<Output = Result<Session>> + Send;

    /// Replace a session, keeping its remaining lifetime.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Session not found → `AuthError::SessionNotFound`
    fn update_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Delete session.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    fn delete_session(
        &self,
        session_id: SessionId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
