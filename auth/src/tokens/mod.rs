//! Single-use tokens.
//!
//! A token is an opaque, URL-safe string with 256 bits of entropy. It is
//! never stored: the store key is `{prefix}:{sha256(token)}`, so a leaked
//! store dump cannot be replayed as links, and lookups do not compare secret
//! bytes in application code.
//!
//! Login and registration tokens share the `auth:link` namespace, which means
//! redeeming a token under the wrong purpose still consumes it. Impersonation
//! entries live under `auth:impersonation` and are keyed by a caller-chosen
//! lookup key instead of a generated token.
//!
//! - [`TokenIssuer`] writes a [`TokenRecord`] (one store write, no delivery)
//! - [`TokenRedeemer`] consumes it exactly once

use crate::constants::{TOKEN_BYTES, key_prefixes};
use crate::state::RequestMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub mod issuer;
pub mod redeemer;

pub use issuer::{IssuedToken, TokenIssuer};
pub use redeemer::{RedeemError, TokenRedeemer};

/// What a token may be redeemed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Log in to an existing account.
    Login,

    /// Create an account.
    Registration,

    /// Start an impersonation session.
    Impersonation,
}

impl TokenPurpose {
    /// Store namespace for this purpose.
    #[must_use]
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::Login | Self::Registration => key_prefixes::LINK_TOKEN,
            Self::Impersonation => key_prefixes::IMPERSONATION,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Registration => "registration",
            Self::Impersonation => "impersonation",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purpose-specific token payload.
///
/// The purpose of a record is derived from its payload, so a record can
/// never claim one purpose while carrying another purpose's data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum TokenPayload {
    /// Login link.
    Login {
        /// Normalized email of the existing account.
        email: String,
    },

    /// Registration link.
    Registration {
        /// Display name captured at request time.
        name: String,
        /// Normalized email of the account to create.
        email: String,
    },

    /// Staged impersonation.
    Impersonation {
        /// Identifier of the account being impersonated.
        subject_id: String,
        /// Display name of the account being impersonated.
        display_name: String,
        /// Signed identity assertion proving the subject.
        assertion: String,
    },
}

impl TokenPayload {
    /// Purpose this payload may be redeemed for.
    #[must_use]
    pub const fn purpose(&self) -> TokenPurpose {
        match self {
            Self::Login { .. } => TokenPurpose::Login,
            Self::Registration { .. } => TokenPurpose::Registration,
            Self::Impersonation { .. } => TokenPurpose::Impersonation,
        }
    }
}

impl fmt::Debug for TokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { email } => f.debug_struct("Login").field("email", email).finish(),
            Self::Registration { name, email } => f
                .debug_struct("Registration")
                .field("name", name)
                .field("email", email)
                .finish(),
            Self::Impersonation {
                subject_id,
                display_name,
                ..
            } => f
                .debug_struct("Impersonation")
                .field("subject_id", subject_id)
                .field("display_name", display_name)
                .field("assertion", &"[redacted]")
                .finish(),
        }
    }
}

/// Stored token record.
///
/// Written once by the issuer and never modified; the only later operation
/// is deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Purpose-specific data.
    pub payload: TokenPayload,

    /// Issue timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp (`issued_at + ttl(purpose)`).
    pub expires_at: DateTime<Utc>,

    /// Where the request came from (audit only).
    pub request_metadata: RequestMetadata,
}

impl TokenRecord {
    /// Purpose of this record.
    #[must_use]
    pub const fn purpose(&self) -> TokenPurpose {
        self.payload.purpose()
    }

    /// Returns `true` once `now` is past `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Generate a cryptographically secure random token.
///
/// Returns a 256-bit random token encoded as base64url (43 characters).
#[must_use]
pub fn generate_token() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut random_bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut random_bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Store key for a token (or impersonation lookup key) of `purpose`.
///
/// # Examples
///
/// ```
/// use passlink_auth::tokens::{TokenPurpose, token_key};
///
/// let key = token_key(TokenPurpose::Login, "abc");
/// assert!(key.starts_with("auth:link:"));
/// assert_eq!(key, token_key(TokenPurpose::Registration, "abc"));
/// assert_ne!(key, token_key(TokenPurpose::Impersonation, "abc"));
/// ```
#[must_use]
pub fn token_key(purpose: TokenPurpose, token: &str) -> String {
    format!("{}:{}", purpose.key_prefix(), key_digest(token))
}

/// Hex-encoded SHA-256 of `value`.
#[must_use]
pub fn key_digest(value: &str) -> String {
    use fmt::Write;

    Sha256::digest(value.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_generated_tokens_are_url_safe_and_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);

        for token in &tokens {
            assert_eq!(token.len(), 43);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }

    #[test]
    fn test_key_digest_is_sha256_hex() {
        assert_eq!(
            key_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_token_key_never_contains_token() {
        let token = generate_token();
        let key = token_key(TokenPurpose::Login, &token);
        assert!(!key.contains(&token));
    }

    #[test]
    fn test_payload_determines_purpose() {
        let payload = TokenPayload::Registration {
            name: "Ada".into(),
            email: "a@x.com".into(),
        };
        assert_eq!(payload.purpose(), TokenPurpose::Registration);
    }

    #[test]
    fn test_record_serialization_is_tagged() {
        let now = Utc::now();
        let record = TokenRecord {
            payload: TokenPayload::Login {
                email: "a@x.com".into(),
            },
            issued_at: now,
            expires_at: now,
            request_metadata: RequestMetadata::new(IpAddr::V4(Ipv4Addr::LOCALHOST), None),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["payload"]["purpose"], "login");
        assert_eq!(serde_json::from_value::<TokenRecord>(value).unwrap(), record);
    }

    #[test]
    fn test_debug_redacts_assertion() {
        let payload = TokenPayload::Impersonation {
            subject_id: "uid-1".into(),
            display_name: "Corner Bistro".into(),
            assertion: "eyJhbGciOi.secret".into(),
        };
        assert!(!format!("{payload:?}").contains("secret"));
    }

    #[test]
    fn test_expiry_is_exclusive_of_expires_at() {
        let now = Utc::now();
        let record = TokenRecord {
            payload: TokenPayload::Login {
                email: "a@x.com".into(),
            },
            issued_at: now,
            expires_at: now,
            request_metadata: RequestMetadata::new(IpAddr::V4(Ipv4Addr::LOCALHOST), None),
        };
        assert!(!record.is_expired(now));
        assert!(record.is_expired(now + chrono::Duration::seconds(1)));
    }
}
