//! In-memory TTL store.
//!
//! A single `Mutex<HashMap>` holds every entry together with its absolute
//! expiry. All operations take the lock once, so `get_and_delete` and the
//! counter updates used by [`MemoryRateLimiter`] are atomic with respect to
//! each other.
//!
//! Expiry is evaluated against the injected [`Clock`], which makes the store
//! usable with a manually advanced clock in tests. Expired entries are
//! purged on the next access to the same key, by a sweep every
//! [`SWEEP_EVERY_WRITES`] writes, or by [`MemoryStore::purge_expired`].
//!
//! [`MemoryRateLimiter`]: super::MemoryRateLimiter

use crate::error::{AuthError, Result};
use crate::providers::{KeyValueStore, Lookup};
use chrono::{DateTime, Duration, Utc};
use passlink_core::environment::{Clock, SystemClock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Writes between two sweeps of expired entries.
pub const SWEEP_EVERY_WRITES: usize = 128;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: DateTime<Utc>,
}

impl Entry {
    /// An entry is live up to and including its expiry instant.
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// In-memory implementation of [`KeyValueStore`].
///
/// Cloning is cheap and clones share the same entries.
///
/// # Example
///
/// ```
/// use passlink_auth::providers::{KeyValueStore, Lookup};
/// use passlink_auth::stores::MemoryStore;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::default();
/// store.put("k", json!({"email": "a@x.com"}), chrono::Duration::minutes(5)).await?;
///
/// assert!(store.get_and_delete("k").await?.is_found());
/// assert_eq!(store.get_and_delete("k").await?, Lookup::NotFoundOrExpired);
/// # Ok::<(), passlink_auth::AuthError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore<C = SystemClock> {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    writes: Arc<AtomicUsize>,
    clock: C,
}

impl<C: Clock> MemoryStore<C> {
    /// Create an empty store that reads time from `clock`.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            writes: Arc::new(AtomicUsize::new(0)),
            clock,
        }
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Clock the store evaluates expiry against.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Returns `true` if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Atomically read, transform, and write back a single entry.
    ///
    /// `update` receives the live value (if any) and the current time, and
    /// returns the replacement entry as `(value, expires_at)` (or `None` to
    /// delete) together with a result for the caller. The lock is held for
    /// the whole call.
    pub(crate) fn update<R>(
        &self,
        key: &str,
        update: impl FnOnce(Option<&Value>, DateTime<Utc>) -> (Option<(Value, DateTime<Utc>)>, R),
    ) -> R {
        let now = self.clock.now();
        let mut entries = self.lock();

        let current = entries.get(key).filter(|e| e.is_live(now)).map(|e| &e.value);
        let (replacement, result) = update(current, now);

        match replacement {
            Some((value, expires_at)) => {
                entries.insert(key.to_string(), Entry { value, expires_at });
                self.after_write(&mut entries, now);
            }
            None => {
                entries.remove(key);
            }
        }

        result
    }

    /// Count a write and sweep expired entries every [`SWEEP_EVERY_WRITES`].
    fn after_write(&self, entries: &mut HashMap<String, Entry>, now: DateTime<Utc>) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES != 0 {
            return;
        }

        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept = swept, remaining = entries.len(), "Swept expired entries");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> KeyValueStore for MemoryStore<C> {
    async fn put(&self, key: &str, payload: Value, ttl: Duration) -> Result<()> {
        if ttl <= Duration::zero() {
            return Err(AuthError::StoreError(format!(
                "TTL must be positive, got {ttl}"
            )));
        }

        let now = self.clock.now();
        let expires_at = now + ttl;
        let mut entries = self.lock();
        entries.insert(
            key.to_string(),
            Entry {
                value: payload,
                expires_at,
            },
        );
        self.after_write(&mut entries, now);
        drop(entries);

        tracing::trace!(key = %key, expires_at = %expires_at, "Stored entry");

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Lookup> {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Lookup::Found(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(Lookup::NotFoundOrExpired)
            }
            None => Ok(Lookup::NotFoundOrExpired),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn get_and_delete(&self, key: &str) -> Result<Lookup> {
        let now = self.clock.now();

        Ok(self
            .lock()
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value)
            .into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use passlink_testing::test_clock;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new(test_clock());

        store.put("k", json!("v"), Duration::minutes(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Lookup::Found(json!("v")));

        // get does not consume
        assert!(store.get("k").await.unwrap().is_found());

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Lookup::NotFoundOrExpired);

        // Deleting a missing key is fine
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryStore::new(test_clock());

        store.put("k", json!(1), Duration::minutes(1)).await.unwrap();
        store.put("k", json!(2), Duration::minutes(1)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Lookup::Found(json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_and_delete_is_single_use() {
        let store = MemoryStore::new(test_clock());
        store.put("k", json!("v"), Duration::minutes(1)).await.unwrap();

        assert_eq!(
            store.get_and_delete("k").await.unwrap(),
            Lookup::Found(json!("v"))
        );
        assert_eq!(
            store.get_and_delete("k").await.unwrap(),
            Lookup::NotFoundOrExpired
        );
    }

    #[tokio::test]
    async fn test_expired_entries_are_never_returned() {
        let clock = test_clock();
        let store = MemoryStore::new(clock.clone());
        store.put("a", json!(1), Duration::seconds(30)).await.unwrap();
        store.put("b", json!(2), Duration::seconds(30)).await.unwrap();

        // Still live at the expiry instant
        clock.advance(Duration::seconds(30));
        assert!(store.get("a").await.unwrap().is_found());

        clock.advance(Duration::seconds(1));
        assert_eq!(store.get("a").await.unwrap(), Lookup::NotFoundOrExpired);
        assert_eq!(
            store.get_and_delete("b").await.unwrap(),
            Lookup::NotFoundOrExpired
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = test_clock();
        let store = MemoryStore::new(clock.clone());
        store.put("short", json!(1), Duration::seconds(5)).await.unwrap();
        store.put("long", json!(2), Duration::minutes(5)).await.unwrap();

        clock.advance(Duration::seconds(10));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_writes_sweep_expired_entries() {
        let clock = test_clock();
        let store = MemoryStore::new(clock.clone());

        for i in 0..1000 {
            store
                .put(&format!("old:{i}"), json!(i), Duration::minutes(15))
                .await
                .unwrap();
        }

        clock.advance(Duration::hours(1));

        for i in 0..1000 {
            store
                .put(&format!("new:{i}"), json!(i), Duration::minutes(15))
                .await
                .unwrap();
        }

        // None of the old keys were read again, yet they are gone
        assert_eq!(store.entries.lock().unwrap().len(), 1000);
        assert_eq!(store.len(), 1000);
    }

    #[tokio::test]
    async fn test_counter_updates_sweep_expired_entries() {
        let clock = test_clock();
        let store = MemoryStore::new(clock.clone());
        store.put("stale", json!(1), Duration::seconds(5)).await.unwrap();

        clock.advance(Duration::seconds(10));

        let expires_at = clock.now() + Duration::minutes(5);
        for _ in 0..SWEEP_EVERY_WRITES {
            store.update("counter", |_, _| (Some((json!(1), expires_at)), ()));
        }

        assert!(!store.entries.lock().unwrap().contains_key("stale"));
    }

    #[tokio::test]
    async fn test_non_positive_ttl_is_rejected() {
        let store = MemoryStore::new(test_clock());

        let result = store.put("k", json!(1), Duration::zero()).await;
        assert!(matches!(result, Err(AuthError::StoreError(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_update_sees_only_live_values() {
        let clock = test_clock();
        let store = MemoryStore::new(clock.clone());
        store.put("k", json!(1), Duration::seconds(5)).await.unwrap();

        clock.advance(Duration::seconds(6));

        let seen = store.update("k", |current, _| (None, current.cloned()));
        assert_eq!(seen, None);
    }
}
