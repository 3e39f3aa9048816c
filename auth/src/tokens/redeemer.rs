//! Token redemption.
//!
//! Redemption is a single atomic `get_and_delete`. Whatever the outcome, a
//! token that was found is gone afterwards: an expired or wrong-purpose
//! token is not reinstated.

use super::{TokenPurpose, TokenRecord, token_key};
use crate::error::AuthError;
use crate::providers::{KeyValueStore, Lookup};
use passlink_core::environment::Clock;
use thiserror::Error;

/// Why a token could not be redeemed.
///
/// `Invalid` and `Expired` are distinguished for audit logs only; the flows
/// report both as `InvalidOrExpired`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RedeemError {
    /// Unknown, already used, wrong purpose, or unreadable.
    #[error("Invalid token")]
    Invalid,

    /// Found, but past its `expires_at`.
    #[error("Expired token")]
    Expired,

    /// Store failure.
    #[error(transparent)]
    Store(#[from] AuthError),
}

/// Consumes token records from the TTL store.
pub struct TokenRedeemer<'a, S> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: KeyValueStore> TokenRedeemer<'a, S> {
    /// Create a redeemer over `store`.
    #[must_use]
    pub const fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Redeem `token` for `purpose`, consuming it.
    ///
    /// Succeeds at most once per token, even under concurrent calls.
    ///
    /// # Errors
    ///
    /// - `RedeemError::Invalid` if the token is unknown, already used,
    ///   unreadable, or was issued for another purpose
    /// - `RedeemError::Expired` if the token was found past its expiry
    /// - `RedeemError::Store` if the store fails
    pub async fn redeem(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> std::result::Result<TokenRecord, RedeemError> {
        let key = token_key(purpose, token);

        let Lookup::Found(value) = self.store.get_and_delete(&key).await? else {
            tracing::warn!(
                purpose = %purpose,
                key = %key,
                reason = "not_found",
                "Token redemption rejected"
            );
            return Err(RedeemError::Invalid);
        };

        let record: TokenRecord = serde_json::from_value(value).map_err(|e| {
            tracing::error!(
                purpose = %purpose,
                key = %key,
                error = %e,
                "Token redemption rejected: unreadable record"
            );
            RedeemError::Invalid
        })?;

        let now = self.clock.now();
        if record.is_expired(now) {
            tracing::warn!(
                purpose = %purpose,
                key = %key,
                expires_at = %record.expires_at,
                now = %now,
                reason = "expired",
                "Token redemption rejected"
            );
            return Err(RedeemError::Expired);
        }

        if record.purpose() != purpose {
            tracing::warn!(
                purpose = %purpose,
                issued_for = %record.purpose(),
                key = %key,
                reason = "purpose_mismatch",
                "Token redemption rejected"
            );
            return Err(RedeemError::Invalid);
        }

        tracing::info!(
            purpose = %purpose,
            key = %key,
            ip_address = %record.request_metadata.ip_address,
            "Token redeemed"
        );

        Ok(record)
    }

    /// Look at a token without consuming it.
    ///
    /// An expired or unreadable entry that is encountered is deleted.
    ///
    /// # Returns
    ///
    /// `None` if no live entry of `purpose` exists under `token`.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn peek(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> crate::error::Result<Option<TokenRecord>> {
        let key = token_key(purpose, token);

        let Lookup::Found(value) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let Ok(record) = serde_json::from_value::<TokenRecord>(value) else {
            tracing::error!(purpose = %purpose, key = %key, "Discarding unreadable token record");
            self.store.delete(&key).await?;
            return Ok(None);
        };

        if record.is_expired(self.clock.now()) {
            tracing::info!(purpose = %purpose, key = %key, "Discarding expired token record");
            self.store.delete(&key).await?;
            return Ok(None);
        }

        if record.purpose() != purpose {
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Delete a token without redeeming it.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn discard(&self, token: &str, purpose: TokenPurpose) -> crate::error::Result<()> {
        let key = token_key(purpose, token);
        self.store.delete(&key).await?;

        tracing::info!(purpose = %purpose, key = %key, "Token discarded");

        Ok(())
    }
}
