//! Redis-based rate limiter implementation.
//!
//! Uses a fixed window counter.
//!
//! # Algorithm
//!
//! One integer per key (`rate_limit:{key}`), updated by a Lua script so the
//! whole check runs atomically on the server:
//! 1. Read the current count (missing key means a new window)
//! 2. If the count has reached the limit, return the key's remaining TTL
//! 3. Otherwise `INCR`, and on the first attempt `PEXPIRE` to the window length
//!
//! The window therefore starts with the first allowed attempt and ends when
//! `Redis` expires the key, after which the next attempt starts at 1.
//!
//! # Security
//!
//! Denied attempts are not counted, so a flood cannot extend the window. A
//! script failure is returned as an error and the flows treat it as a failed
//! request (never as "allowed").

use crate::config::RateLimitPolicy;
use crate::constants::key_prefixes;
use crate::error::{AuthError, Result};
use crate::providers::{RateLimitDecision, RateLimiter};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;

/// Check-and-increment script.
///
/// KEYS[1] = counter key, ARGV[1] = max attempts, ARGV[2] = window in ms.
/// Returns `{allowed, count, pttl}`.
const ALLOW_SCRIPT: &str = r"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
local max_attempts = tonumber(ARGV[1])
if count >= max_attempts then
  return {0, count, redis.call('PTTL', KEYS[1])}
end
count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return {1, count, 0}
";

/// Decrement-if-positive script. `DECR` keeps the key's TTL, so the window
/// end does not move.
///
/// KEYS[1] = counter key. Returns the new count.
const REFUND_SCRIPT: &str = r"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if count > 0 then
  return redis.call('DECR', KEYS[1])
end
return 0
";

/// `Redis`-based fixed-window rate limiter.
///
/// # Example
///
/// ```no_run
/// use passlink_auth::config::RateLimitPolicy;
/// use passlink_auth::providers::RateLimiter;
/// use passlink_auth::stores::RedisRateLimiter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = RedisRateLimiter::new("redis://127.0.0.1:6379").await?;
///
/// // 5 attempts per 5 minutes
/// let decision = limiter
///     .allow("magic-verify:203.0.113.7", RateLimitPolicy::per_minutes(5, 5))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisRateLimiter {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,

    /// Prepared check-and-increment script (loaded lazily via EVALSHA).
    script: Script,

    /// Prepared refund script.
    refund_script: Script,
}

impl RedisRateLimiter {
    /// Create a new `Redis` rate limiter.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AuthError::StoreError(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::StoreError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self::from_connection_manager(conn_manager))
    }

    /// Build a limiter on an existing connection manager.
    #[must_use]
    pub fn from_connection_manager(conn_manager: ConnectionManager) -> Self {
        Self {
            conn_manager,
            script: Script::new(ALLOW_SCRIPT),
            refund_script: Script::new(REFUND_SCRIPT),
        }
    }

    /// Get the `Redis` key for rate limiting.
    fn rate_limit_key(key: &str) -> String {
        format!("{}:{key}", key_prefixes::RATE_LIMIT)
    }
}

impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, key: &str, policy: RateLimitPolicy) -> Result<RateLimitDecision> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);
        let window_ms = u64::try_from(policy.window.as_millis())
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| AuthError::InternalError("Invalid rate limit window".to_string()))?;

        let (allowed, count, pttl): (i64, i64, i64) = self
            .script
            .key(&rate_key)
            .arg(policy.max_attempts)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %key,
                    "Redis script failed during rate limit check"
                );
                AuthError::StoreError(format!("Failed to check rate limit: {e}"))
            })?;

        let count = u32::try_from(count).unwrap_or(u32::MAX);

        if allowed == 1 {
            tracing::debug!(
                key = %key,
                attempts = count,
                max_attempts = policy.max_attempts,
                window_ms = window_ms,
                "Rate limit check passed"
            );
            return Ok(RateLimitDecision::allowed(count));
        }

        // PTTL is negative when the key is missing or has no expiry
        let retry_after = u64::try_from(pttl)
            .ok()
            .filter(|ms| *ms > 0)
            .map_or(policy.window, Duration::from_millis);

        tracing::warn!(
            rate_limit_exceeded = true,
            key = %key,
            attempts = count,
            max_attempts = policy.max_attempts,
            retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            "Rate limit exceeded"
        );

        Ok(RateLimitDecision::denied(count, retry_after))
    }

    async fn refund(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);

        let count: i64 = self
            .refund_script
            .key(&rate_key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AuthError::StoreError(format!("Failed to refund rate limit: {e}")))?;

        tracing::debug!(key = %key, attempts = count, "Refunded rate limit attempt");

        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);

        let _: () = conn
            .del(&rate_key)
            .await
            .map_err(|e| AuthError::StoreError(format!("Failed to reset rate limit: {e}")))?;

        tracing::info!(
            key = %key,
            "Reset rate limit"
        );

        Ok(())
    }

    async fn attempts(&self, key: &str) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);

        let count: Option<u32> = conn.get(&rate_key).await.map_err(|e| {
            AuthError::StoreError(format!("Failed to get rate limit attempts: {e}"))
        })?;

        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_rate_limit_blocks_over_limit() {
        let limiter = RedisRateLimiter::new("redis://127.0.0.1:6379")
            .await
            .unwrap();

        let key = format!("test:block:{}", uuid::Uuid::new_v4());
        let policy = RateLimitPolicy::new(3, Duration::from_secs(60));

        for i in 1..=3 {
            let decision = limiter.allow(&key, policy).await.unwrap();
            assert!(decision.allowed, "Attempt {i} should succeed");
            assert_eq!(decision.count, i);
        }

        let decision = limiter.allow(&key, policy).await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.retry_after > Duration::ZERO);
        assert!(decision.retry_after <= Duration::from_secs(60));

        // Denied attempts are not counted
        assert_eq!(limiter.attempts(&key).await.unwrap(), 3);

        limiter.reset(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_rate_limit_window_expires() {
        let limiter = RedisRateLimiter::new("redis://127.0.0.1:6379")
            .await
            .unwrap();

        let key = format!("test:window:{}", uuid::Uuid::new_v4());
        let policy = RateLimitPolicy::new(1, Duration::from_millis(100));

        assert!(limiter.allow(&key, policy).await.unwrap().allowed);
        assert!(!limiter.allow(&key, policy).await.unwrap().allowed);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let decision = limiter.allow(&key, policy).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_concurrent_attempts_never_exceed_limit() {
        let limiter = RedisRateLimiter::new("redis://127.0.0.1:6379")
            .await
            .unwrap();

        let key = format!("test:concurrent:{}", uuid::Uuid::new_v4());
        let policy = RateLimitPolicy::new(5, Duration::from_secs(60));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                let key = key.clone();
                tokio::spawn(async move { limiter.allow(&key, policy).await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().allowed {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 5);
        assert_eq!(limiter.attempts(&key).await.unwrap(), 5);

        limiter.reset(&key).await.unwrap();
    }
}
