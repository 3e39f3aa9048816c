//! Passwordless and impersonation flows.
//!
//! Each flow borrows an [`AuthEnvironment`] and exposes one async method per
//! external operation. Every method returns an explicit error-kind enum, and
//! none of them retries: a store or provider failure is returned to the
//! caller as soon as it happens.
//!
//! ```text
//! request_link:  validate ─▶ identity check ─▶ limiter(email) ─▶ issue ─▶ email
//! verify_link:   limiter(ip) ─▶ redeem ─▶ identity check/create ─▶ session
//! impersonation: stage ─▶ check (peek) ─▶ process (consume) ─▶ end
//! ```
//!
//! [`AuthEnvironment`]: crate::environment::AuthEnvironment

use crate::config::{PasswordlessConfig, RateLimitPolicy};
use crate::error::AuthError;
use crate::metrics;
use crate::providers::{RateLimiter, User};
use crate::state::{Impersonation, RequestMetadata, Session, SessionId, SessionUser};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub mod impersonation;
pub mod login;
pub mod registration;

pub use impersonation::ImpersonationFlow;
pub use login::LoginFlow;
pub use registration::RegistrationFlow;

/// A link was issued and handed to the email provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSent {
    /// Normalized recipient address.
    pub email: String,

    /// When the link stops working.
    pub expires_at: DateTime<Utc>,
}

/// A registration link was redeemed and the account created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    /// Session established for the new account.
    pub session: Session,

    /// The created account.
    pub user: User,

    /// Always `true`: a registration link never logs into an existing
    /// account.
    pub created: bool,
}

/// Result of polling for a staged impersonation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImpersonationCheck {
    /// Whether a live, verified impersonation is waiting under the key.
    pub has_impersonation: bool,

    /// Subject of the staged impersonation.
    pub subject_id: Option<String>,

    /// Display name of the staged subject.
    pub display_name: Option<String>,

    /// Signed identity assertion of the staged subject.
    pub assertion: Option<String>,
}

/// An impersonation session was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpersonationStarted {
    /// The impersonating session.
    pub session: Session,

    /// Subject being impersonated.
    pub subject_id: String,

    /// Display name of the subject.
    pub display_name: String,
}

/// Impersonation state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImpersonationStatus {
    /// Whether the session is currently impersonating.
    pub is_impersonated: bool,

    /// Subject being impersonated.
    pub subject_id: Option<String>,

    /// Display name of the subject.
    pub display_name: Option<String>,

    /// When the impersonation began.
    pub impersonated_at: Option<DateTime<Utc>>,
}

impl From<&Session> for ImpersonationStatus {
    fn from(session: &Session) -> Self {
        session
            .impersonation
            .as_ref()
            .map_or_else(Self::default, |imp| Self {
                is_impersonated: true,
                subject_id: Some(imp.subject_id.clone()),
                display_name: Some(imp.display_name.clone()),
                impersonated_at: Some(imp.impersonated_at),
            })
    }
}

/// Run one rate-limit check.
///
/// Returns `Some(retry_after)` when the attempt is denied.
pub(crate) async fn check_rate_limit<RL: RateLimiter>(
    limiter: &RL,
    flow: &'static str,
    key: &str,
    policy: RateLimitPolicy,
) -> Result<Option<Duration>, AuthError> {
    let decision = limiter.allow(key, policy).await?;

    if decision.allowed {
        return Ok(None);
    }

    metrics::increment(metrics::RATE_LIMIT_DENIED, flow);
    tracing::warn!(
        flow = flow,
        key = %key,
        retry_after_secs = decision.retry_after.as_secs(),
        "Request rate limited"
    );

    Ok(Some(decision.retry_after))
}

/// Give back a request-side attempt after the gated action failed.
///
/// A refund failure is logged and swallowed: the caller already has an
/// error to report.
pub(crate) async fn refund_rate_limit<RL: RateLimiter>(limiter: &RL, flow: &'static str, key: &str) {
    if let Err(e) = limiter.refund(key).await {
        tracing::warn!(flow = flow, key = %key, error = %e, "Failed to refund rate limit attempt");
    }
}

/// Build a new session for `user` or `impersonation`.
pub(crate) fn new_session(
    config: &PasswordlessConfig,
    now: DateTime<Utc>,
    user: Option<SessionUser>,
    impersonation: Option<Impersonation>,
    login_method: &str,
    metadata: RequestMetadata,
) -> Session {
    Session {
        session_id: SessionId::new(),
        user,
        impersonation,
        login_method: login_method.to_string(),
        created_at: now,
        expires_at: now + config.session_duration,
        ip_address: metadata.ip_address,
        user_agent: metadata.user_agent,
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}
