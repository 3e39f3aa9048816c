//! Session and request types.
//!
//! All types are `Clone` and serializable so they can be persisted in any
//! key-value store and handed across request handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    /// Generate a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Request Metadata
// ═══════════════════════════════════════════════════════════════════════

/// Where a request came from.
///
/// Recorded on tokens and sessions for audit. Never used for authorization,
/// except that the IP address keys the verify-side rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Client IP address.
    pub ip_address: IpAddr,

    /// Client user agent, if sent.
    pub user_agent: Option<String>,
}

impl RequestMetadata {
    /// Create request metadata.
    #[must_use]
    pub fn new(ip_address: IpAddr, user_agent: impl Into<Option<String>>) -> Self {
        Self {
            ip_address,
            user_agent: user_agent.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════════════════

/// Authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub session_id: SessionId,

    /// Account the session is logged in as, if any.
    ///
    /// `None` for a session that only carries an impersonation.
    pub user: Option<SessionUser>,

    /// Active impersonation, if any.
    pub impersonation: Option<Impersonation>,

    /// How the session was established (see `constants::login_methods`).
    pub login_method: String,

    /// Session creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Session expiration timestamp.
    pub expires_at: DateTime<Utc>,

    /// IP address from which the session was created.
    pub ip_address: IpAddr,

    /// User agent string.
    pub user_agent: Option<String>,
}

impl Session {
    /// Returns `true` while an impersonation is active on this session.
    #[must_use]
    pub const fn is_impersonated(&self) -> bool {
        self.impersonation.is_some()
    }
}

/// Account details cached on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// User ID.
    pub user_id: UserId,

    /// Email address.
    pub email: String,

    /// Display name.
    pub name: Option<String>,
}

/// Impersonation flags carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impersonation {
    /// Subject identifier of the impersonated account.
    pub subject_id: String,

    /// Display name of the impersonated account.
    pub display_name: String,

    /// When the impersonation began.
    pub impersonated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_user_id_generation() {
        let id1 = UserId::new();
        let id2 = UserId::new();

        // IDs should be unique
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_id_generation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();

        // Session IDs should be unique
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_impersonation_flag() {
        let now = Utc::now();
        let mut session = Session {
            session_id: SessionId::new(),
            user: None,
            impersonation: Some(Impersonation {
                subject_id: "uid-1".into(),
                display_name: "Corner Bistro".into(),
                impersonated_at: now,
            }),
            login_method: "impersonation".into(),
            created_at: now,
            expires_at: now,
            ip_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            user_agent: None,
        };
        assert!(session.is_impersonated());

        session.impersonation = None;
        assert!(!session.is_impersonated());
    }

    #[test]
    fn test_request_metadata_accepts_plain_string() {
        let meta = RequestMetadata::new(IpAddr::V4(Ipv4Addr::LOCALHOST), "curl/8.0".to_string());
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    }
}
