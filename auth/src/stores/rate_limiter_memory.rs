//! In-memory fixed-window rate limiter.
//!
//! Counters are ordinary entries in a [`MemoryStore`], stored under
//! `rate_limit:{key}` with a TTL equal to the end of their window. Check and
//! increment happen under the store lock, so concurrent callers can never
//! push a counter past `max_attempts`. A refund decrements under the same
//! lock and keeps the window end.

use crate::config::RateLimitPolicy;
use crate::constants::key_prefixes;
use crate::error::{AuthError, Result};
use crate::providers::{KeyValueStore, Lookup, RateLimitDecision, RateLimiter};
use crate::stores::MemoryStore;
use chrono::{DateTime, Utc};
use passlink_core::environment::{Clock, SystemClock};
use serde::{Deserialize, Serialize};

/// Persisted counter state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Counter {
    count: u32,
    window_ends_at: DateTime<Utc>,
}

impl Counter {
    fn parse(value: Option<&serde_json::Value>, now: DateTime<Utc>) -> Option<Self> {
        value
            .and_then(|value| serde_json::from_value::<Self>(value.clone()).ok())
            .filter(|counter| now < counter.window_ends_at)
    }

    fn stored(self) -> Option<(serde_json::Value, DateTime<Utc>)> {
        serde_json::to_value(self).ok().map(|v| (v, self.window_ends_at))
    }
}

/// Rate limiter backed by a [`MemoryStore`].
///
/// # Example
///
/// ```
/// use passlink_auth::config::RateLimitPolicy;
/// use passlink_auth::providers::RateLimiter;
/// use passlink_auth::stores::{MemoryRateLimiter, MemoryStore};
///
/// # tokio_test::block_on(async {
/// let limiter = MemoryRateLimiter::new(MemoryStore::default());
/// let policy = RateLimitPolicy::per_minutes(1, 5);
///
/// assert!(limiter.allow("magic-link:a@x.com", policy).await?.allowed);
/// assert!(!limiter.allow("magic-link:a@x.com", policy).await?.allowed);
/// # Ok::<(), passlink_auth::AuthError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRateLimiter<C = SystemClock> {
    store: MemoryStore<C>,
}

impl<C: Clock> MemoryRateLimiter<C> {
    /// Create a limiter that keeps its counters in `store`.
    #[must_use]
    pub const fn new(store: MemoryStore<C>) -> Self {
        Self { store }
    }

    fn counter_key(key: &str) -> String {
        format!("{}:{key}", key_prefixes::RATE_LIMIT)
    }
}

impl Default for MemoryRateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new(MemoryStore::default())
    }
}

impl<C: Clock> RateLimiter for MemoryRateLimiter<C> {
    async fn allow(&self, key: &str, policy: RateLimitPolicy) -> Result<RateLimitDecision> {
        let window = chrono::Duration::from_std(policy.window)
            .map_err(|e| AuthError::InternalError(format!("Invalid rate limit window: {e}")))?;

        if policy.max_attempts == 0 {
            return Ok(RateLimitDecision::denied(0, policy.window));
        }

        let counter_key = Self::counter_key(key);

        let decision = self.store.update(&counter_key, |current, now| {
            let counter = match Counter::parse(current, now) {
                Some(counter) if counter.count >= policy.max_attempts => {
                    let retry_after = (counter.window_ends_at - now).to_std().unwrap_or_default();
                    return (
                        counter.stored(),
                        RateLimitDecision::denied(counter.count, retry_after),
                    );
                }
                Some(counter) => Counter {
                    count: counter.count + 1,
                    ..counter
                },
                None => Counter {
                    count: 1,
                    window_ends_at: now + window,
                },
            };

            (counter.stored(), RateLimitDecision::allowed(counter.count))
        });

        if decision.allowed {
            tracing::debug!(
                key = %key,
                attempts = decision.count,
                max_attempts = policy.max_attempts,
                "Rate limit check passed"
            );
        } else {
            tracing::warn!(
                rate_limit_exceeded = true,
                key = %key,
                attempts = decision.count,
                max_attempts = policy.max_attempts,
                retry_after_ms = u64::try_from(decision.retry_after.as_millis()).unwrap_or(u64::MAX),
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    async fn refund(&self, key: &str) -> Result<()> {
        let remaining = self
            .store
            .update(&Self::counter_key(key), |current, now| {
                match Counter::parse(current, now) {
                    Some(counter) => {
                        let counter = Counter {
                            count: counter.count.saturating_sub(1),
                            ..counter
                        };
                        (counter.stored(), counter.count)
                    }
                    None => (None, 0),
                }
            });

        tracing::debug!(key = %key, attempts = remaining, "Refunded rate limit attempt");

        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.store.delete(&Self::counter_key(key)).await?;

        tracing::info!(key = %key, "Reset rate limit");

        Ok(())
    }

    async fn attempts(&self, key: &str) -> Result<u32> {
        match self.store.get(&Self::counter_key(key)).await? {
            Lookup::Found(value) => Ok(serde_json::from_value::<Counter>(value)?.count),
            Lookup::NotFoundOrExpired => Ok(0),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use passlink_testing::{FixedClock, test_clock};

    fn limiter() -> (MemoryRateLimiter<FixedClock>, FixedClock) {
        let clock = test_clock();
        (MemoryRateLimiter::new(MemoryStore::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_fourth_attempt_is_denied() {
        let (limiter, _clock) = limiter();
        let policy = RateLimitPolicy::per_minutes(3, 5);

        for expected in 1..=3 {
            let decision = limiter.allow("magic-link:a@x.com", policy).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.count, expected);
        }

        let decision = limiter.allow("magic-link:a@x.com", policy).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.count, 3);
        assert_eq!(decision.retry_after, std::time::Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_retry_after_shrinks_with_time() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::per_minutes(1, 5);

        limiter.allow("k", policy).await.unwrap();
        clock.advance(Duration::seconds(120));

        let decision = limiter.allow("k", policy).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, std::time::Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_new_window_after_elapse() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::per_minutes(3, 5);

        for _ in 0..4 {
            limiter.allow("k", policy).await.unwrap();
        }

        clock.advance(Duration::minutes(5));

        let decision = limiter.allow("k", policy).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (limiter, _clock) = limiter();
        let policy = RateLimitPolicy::per_minutes(1, 5);

        assert!(limiter.allow("magic-link:a@x.com", policy).await.unwrap().allowed);
        assert!(limiter.allow("magic-link:b@x.com", policy).await.unwrap().allowed);
        assert!(!limiter.allow("magic-link:a@x.com", policy).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_reset_and_attempts() {
        let (limiter, _clock) = limiter();
        let policy = RateLimitPolicy::per_minutes(3, 5);

        limiter.allow("k", policy).await.unwrap();
        limiter.allow("k", policy).await.unwrap();
        assert_eq!(limiter.attempts("k").await.unwrap(), 2);

        limiter.reset("k").await.unwrap();
        assert_eq!(limiter.attempts("k").await.unwrap(), 0);
        assert_eq!(limiter.allow("k", policy).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_refund_gives_back_one_attempt() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::per_minutes(3, 5);

        for _ in 0..3 {
            limiter.allow("k", policy).await.unwrap();
        }
        assert!(!limiter.allow("k", policy).await.unwrap().allowed);

        limiter.refund("k").await.unwrap();
        assert_eq!(limiter.attempts("k").await.unwrap(), 2);

        clock.advance(Duration::minutes(1));
        let decision = limiter.allow("k", policy).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, 3);

        // Refunding does not extend the window
        let decision = limiter.allow("k", policy).await.unwrap();
        assert_eq!(decision.retry_after, std::time::Duration::from_secs(240));
    }

    #[tokio::test]
    async fn test_refund_without_attempts_is_a_no_op() {
        let (limiter, _clock) = limiter();
        let policy = RateLimitPolicy::per_minutes(1, 5);

        limiter.refund("k").await.unwrap();
        assert_eq!(limiter.attempts("k").await.unwrap(), 0);

        limiter.allow("k", policy).await.unwrap();
        limiter.refund("k").await.unwrap();
        limiter.refund("k").await.unwrap();
        assert_eq!(limiter.attempts("k").await.unwrap(), 0);
        assert_eq!(limiter.allow("k", policy).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_zero_max_attempts_denies_everything() {
        let (limiter, _clock) = limiter();

        let decision = limiter
            .allow("k", RateLimitPolicy::per_minutes(0, 1))
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(limiter.attempts("k").await.unwrap(), 0);
    }
}
