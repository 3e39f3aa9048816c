//! Error types for token storage and the passwordless flows.
//!
//! [`AuthError`] covers infrastructure failures (store, database, delivery
//! transport). Each flow then has its own error-kind enum so that every failure
//! path a caller can observe is enumerable:
//!
//! - [`RequestLinkError`] for requesting a login or registration link
//! - [`VerifyLinkError`] for redeeming a login or registration link
//! - [`ImpersonationError`] for the impersonation hand-off

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for store and provider operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Infrastructure errors raised by stores and providers.
///
/// None of these are fatal to the process; flows wrap them in their own
/// `Store` variant and return them to the caller immediately, without retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Lookup Errors
    // ═══════════════════════════════════════════════════════════

    /// Requested resource not found.
    #[error("Resource not found")]
    ResourceNotFound,

    /// Session not found (or already expired).
    #[error("Session not found")]
    SessionNotFound,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// TTL store operation failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// Stored payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Identity store operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Notification transport failed.
    #[error("Email error: {0}")]
    EmailError(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Returns `true` if the error is caused by missing data rather than a
    /// broken dependency.
    ///
    /// # Examples
    ///
    /// ```
    /// # use passlink_auth::AuthError;
    /// assert!(AuthError::ResourceNotFound.is_not_found());
    /// assert!(!AuthError::StoreError("down".into()).is_not_found());
    /// ```
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound | Self::SessionNotFound)
    }

    /// Returns `true` if the caller may reasonably try the same request again
    /// later (transient dependency failure).
    ///
    /// # Examples
    ///
    /// ```
    /// # use passlink_auth::AuthError;
    /// assert!(AuthError::StoreError("timeout".into()).is_retryable());
    /// assert!(!AuthError::SerializationError("bad json".into()).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreError(_) | Self::DatabaseError(_) | Self::EmailError(_)
        )
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Failure to request a login or registration link.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestLinkError {
    /// Input was malformed or refers to the wrong kind of account.
    ///
    /// Always user-correctable; `message` is shown verbatim.
    #[error("{message}")]
    ValidationFailed {
        /// Offending input field (`"email"` or `"name"`).
        field: &'static str,
        /// User-facing message.
        message: String,
    },

    /// Too many link requests for this email address.
    #[error("Too many requests, please retry after {retry_after:?}")]
    RateLimited {
        /// Time left in the current window.
        retry_after: Duration,
    },

    /// The link was issued but the notification could not be delivered.
    ///
    /// The token remains valid until `expires_at`.
    #[error("Failed to deliver link")]
    DeliveryFailed {
        /// Expiry of the token that was issued but not delivered.
        expires_at: DateTime<Utc>,
    },

    /// Store or identity store failure.
    #[error(transparent)]
    Store(#[from] AuthError),
}

impl RequestLinkError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            message: message.into(),
        }
    }

    /// User-facing message for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationFailed { message, .. } => message.clone(),
            Self::RateLimited { retry_after } => format!(
                "Too many requests. Please try again in {} seconds.",
                retry_after.as_secs().max(1)
            ),
            Self::DeliveryFailed { .. } => {
                "Failed to send the link. Please try again.".to_string()
            }
            Self::Store(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Failure to redeem a login or registration link.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyLinkError {
    /// Too many verification attempts from this IP address.
    #[error("Too many verification attempts, please retry after {retry_after:?}")]
    RateLimited {
        /// Time left in the current window.
        retry_after: Duration,
    },

    /// Token never existed, was already used, has expired, or belongs to
    /// another flow. Callers cannot tell these apart.
    #[error("Invalid or expired link")]
    InvalidOrExpired,

    /// Login link was valid but the account no longer exists.
    #[error("Account not found")]
    AccountNotFound,

    /// Registration link was valid but the email was registered meanwhile.
    #[error("Account already exists")]
    AccountAlreadyExists,

    /// Store, identity store, or session store failure.
    #[error(transparent)]
    Store(#[from] AuthError),
}

impl VerifyLinkError {
    /// User-facing message for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited { retry_after } => format!(
                "Too many verification attempts. Please try again in {} seconds.",
                retry_after.as_secs().max(1)
            ),
            Self::InvalidOrExpired => {
                "Invalid or expired link. Please request a new one.".to_string()
            }
            Self::AccountNotFound => "User not found. Please contact support.".to_string(),
            Self::AccountAlreadyExists => {
                "This email address is already registered.".to_string()
            }
            Self::Store(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Failure in the impersonation hand-off.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImpersonationError {
    /// No entry under the lookup key (never staged or already consumed).
    #[error("No impersonation token found")]
    NotFound,

    /// Entry was found but had expired. It has been removed.
    #[error("Impersonation token has expired")]
    Expired,

    /// Identity assertion was rejected or names a different subject.
    /// The entry has been consumed.
    #[error("Invalid impersonation token: {reason}")]
    AssertionInvalid {
        /// Why the assertion was rejected (for logs, not for end users).
        reason: String,
    },

    /// Staging request was malformed.
    #[error("{message}")]
    ValidationFailed {
        /// User-facing message.
        message: String,
    },

    /// Store or session store failure.
    #[error(transparent)]
    Store(#[from] AuthError),
}

impl ImpersonationError {
    /// User-facing message for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound => "No impersonation token found".to_string(),
            Self::Expired => "Impersonation token has expired".to_string(),
            Self::AssertionInvalid { .. } => "Invalid impersonation token".to_string(),
            Self::ValidationFailed { message } => message.clone(),
            Self::Store(_) => "Error processing impersonation".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_convert_into_flow_errors() {
        let err: VerifyLinkError = AuthError::StoreError("connection reset".into()).into();
        assert!(matches!(err, VerifyLinkError::Store(AuthError::StoreError(_))));

        let err: RequestLinkError = AuthError::DatabaseError("down".into()).into();
        assert!(matches!(err, RequestLinkError::Store(_)));
    }

    #[test]
    fn test_rate_limited_message_reports_seconds() {
        let err = RequestLinkError::RateLimited {
            retry_after: Duration::from_secs(120),
        };
        assert_eq!(
            err.user_message(),
            "Too many requests. Please try again in 120 seconds."
        );
    }

    #[test]
    fn test_sub_second_retry_is_rounded_up() {
        let err = VerifyLinkError::RateLimited {
            retry_after: Duration::from_millis(300),
        };
        assert!(err.user_message().contains("in 1 seconds"));
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = RequestLinkError::validation("email", "Please enter a valid email address.");
        assert_eq!(err.to_string(), "Please enter a valid email address.");
        assert_eq!(err.user_message(), "Please enter a valid email address.");
    }

    #[test]
    fn test_assertion_reason_not_shown_to_users() {
        let err = ImpersonationError::AssertionInvalid {
            reason: "subject mismatch".into(),
        };
        assert_eq!(err.user_message(), "Invalid impersonation token");
        assert!(err.to_string().contains("subject mismatch"));
    }
}
