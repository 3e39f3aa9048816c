//! TTL key-value store trait.
//!
//! The store is the only shared mutable resource in the system. Token records
//! and rate-limit counters live here and nowhere else.

use crate::error::Result;
use chrono::Duration;
use serde_json::Value;

/// Result of a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Live entry.
    Found(Value),

    /// No entry, or the entry outlived its TTL.
    NotFoundOrExpired,
}

impl Lookup {
    /// Convert into an `Option`, dropping the distinction in the type.
    #[must_use]
    pub fn into_option(self) -> Option<Value> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFoundOrExpired => None,
        }
    }

    /// Returns `true` if an entry was found.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl From<Option<Value>> for Lookup {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::NotFoundOrExpired, Self::Found)
    }
}

/// Key-value store with per-entry expiry.
///
/// # Implementation Notes
///
/// - Expired entries are never returned, whether the backend purges them
///   eagerly or lazily.
/// - **CRITICAL**: `get_and_delete()` MUST be atomic. Exactly one of N
///   concurrent callers may observe a given entry (`Redis` GETDEL, or a
///   mutex-protected remove in memory).
/// - No operation retries internally; backend failures surface as
///   `AuthError::StoreError`.
pub trait KeyValueStore: Send + Sync {
    /// Store `payload` under `key` for `ttl`, overwriting any existing entry.
    ///
    /// # Errors
    ///
    /// Returns error if the backend write fails or `ttl` is not positive.
    fn put(
        &self,
        key: &str,
        payload: Value,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read the entry under `key` without consuming it.
    ///
    /// # Errors
    ///
    /// Returns error if the backend read fails or the stored bytes are not
    /// valid JSON.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Lookup>> + Send;

    /// Remove the entry under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the backend delete fails.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Atomically read and remove the entry under `key`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend operation fails or the stored bytes are
    /// not valid JSON. The entry is gone either way.
    fn get_and_delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Lookup>> + Send;
}
