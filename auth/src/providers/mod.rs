//! Provider traits.
//!
//! Every external dependency of the flows is expressed as a trait here, and
//! the flows only see these traits through [`AuthEnvironment`]. Concrete
//! implementations live in [`crate::stores`] (memory, Redis, `PostgreSQL`),
//! in this module (console and SMTP email), and in [`crate::mocks`].
//!
//! ```text
//!  ┌──────────────┐        ┌──────────────────────────────┐
//!  │ Flows        │ ─────▶ │ KeyValueStore   RateLimiter  │  shared, TTL-bound
//!  │ (login,      │        ├──────────────────────────────┤
//!  │  register,   │ ─────▶ │ UserRepository  SessionStore │  identity + sessions
//!  │  impersonate)│        ├──────────────────────────────┤
//!  └──────────────┘ ─────▶ │ EmailProvider   Assertion-   │  outbound
//!                          │                 Verifier     │
//!                          └──────────────────────────────┘
//! ```
//!
//! [`AuthEnvironment`]: crate::environment::AuthEnvironment

use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod assertion;
pub mod console_email;
pub mod email;
pub mod kv_store;
pub mod rate_limiter;
pub mod session;
pub mod smtp_email;
pub mod user;

// Re-export provider traits
pub use assertion::{AssertionVerifier, VerifiedAssertion};
pub use console_email::ConsoleEmailProvider;
pub use email::EmailProvider;
pub use kv_store::{KeyValueStore, Lookup};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use session::SessionStore;
pub use smtp_email::SmtpEmailProvider;
pub use user::UserRepository;

/// User data model.
///
/// Stored by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub user_id: UserId,

    /// Email address (normalized).
    pub email: String,

    /// Display name.
    pub name: Option<String>,

    /// Email verified flag.
    pub email_verified: bool,

    /// Account created timestamp.
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Account to be created by [`UserRepository::create_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Email address (normalized).
    pub email: String,

    /// Display name.
    pub name: String,

    /// Whether the email address has been proven by the caller.
    pub email_verified: bool,
}
