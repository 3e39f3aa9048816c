//! Token issuance.

use super::{TokenPayload, TokenPurpose, TokenRecord, generate_token, token_key};
use crate::config::TokenTtls;
use crate::error::Result;
use crate::providers::KeyValueStore;
use crate::state::RequestMetadata;
use chrono::{DateTime, Utc};
use passlink_core::environment::Clock;

/// Result of issuing a token.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Bearer token (or the caller's lookup key for [`TokenIssuer::issue_at`]).
    pub token: String,

    /// Purpose the token may be redeemed for.
    pub purpose: TokenPurpose,

    /// Issue timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[redacted]")
            .field("purpose", &self.purpose)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Writes token records into the TTL store.
///
/// Issuing is exactly one store write. Nothing is delivered here; the flows
/// decide what to do with the token afterwards.
pub struct TokenIssuer<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
    ttls: TokenTtls,
}

impl<'a, S: KeyValueStore> TokenIssuer<'a, S> {
    /// Create an issuer over `store`.
    #[must_use]
    pub const fn new(store: &'a S, clock: &'a dyn Clock, ttls: TokenTtls) -> Self {
        Self { store, clock, ttls }
    }

    /// Issue a fresh random token for `payload`.
    ///
    /// The TTL is taken from the payload's purpose.
    ///
    /// # Errors
    ///
    /// Returns error if the store write fails. No token exists in that case.
    pub async fn issue(
        &self,
        payload: TokenPayload,
        metadata: RequestMetadata,
    ) -> Result<IssuedToken> {
        let token = generate_token();
        self.write(token, payload, metadata).await
    }

    /// Store `payload` under a caller-chosen lookup key.
    ///
    /// Used to stage impersonations, where the administrative surface picks
    /// the key. Re-staging under the same key replaces the previous entry.
    ///
    /// # Errors
    ///
    /// Returns error if the store write fails.
    pub async fn issue_at(
        &self,
        lookup_key: &str,
        payload: TokenPayload,
        metadata: RequestMetadata,
    ) -> Result<IssuedToken> {
        self.write(lookup_key.to_string(), payload, metadata).await
    }

    async fn write(
        &self,
        token: String,
        payload: TokenPayload,
        metadata: RequestMetadata,
    ) -> Result<IssuedToken> {
        let purpose = payload.purpose();
        let ttl = self.ttls.for_purpose(purpose);
        let issued_at = self.clock.now();
        let expires_at = issued_at + ttl;
        let key = token_key(purpose, &token);

        let record = TokenRecord {
            payload,
            issued_at,
            expires_at,
            request_metadata: metadata,
        };

        self.store
            .put(&key, serde_json::to_value(&record)?, ttl)
            .await?;

        tracing::info!(
            purpose = %purpose,
            key = %key,
            expires_at = %expires_at,
            ip_address = %record.request_metadata.ip_address,
            "Issued token"
        );

        Ok(IssuedToken {
            token,
            purpose,
            issued_at,
            expires_at,
        })
    }
}
