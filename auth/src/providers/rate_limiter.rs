//! Rate limiter trait for link requests and verifications.
//!
//! # Algorithm
//!
//! Fixed window per key. The first allowed call opens a window of
//! `policy.window`; calls inside the window are allowed until the count reaches
//! `policy.max_attempts`. Once the window has elapsed the next call opens a
//! fresh window with a count of 1.
//!
//! # Security
//!
//! The request side is keyed by email (`magic-link:{email}`) to stop inbox
//! flooding. The verify side is keyed by IP (`magic-verify:{ip}`) and every
//! attempt counts, including ones that later fail, to stop token guessing.

use crate::config::RateLimitPolicy;
use crate::error::Result;
use std::time::Duration;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the action may proceed.
    pub allowed: bool,

    /// Attempts recorded in the current window, including this one when
    /// allowed.
    pub count: u32,

    /// Time until the current window closes. Zero when allowed.
    pub retry_after: Duration,
}

impl RateLimitDecision {
    /// Decision for an allowed attempt.
    #[must_use]
    pub const fn allowed(count: u32) -> Self {
        Self {
            allowed: true,
            count,
            retry_after: Duration::ZERO,
        }
    }

    /// Decision for a denied attempt.
    #[must_use]
    pub const fn denied(count: u32, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            count,
            retry_after,
        }
    }
}

/// Fixed-window rate limiter.
///
/// # Example
///
/// ```no_run
/// use passlink_auth::config::RateLimitPolicy;
/// use passlink_auth::providers::RateLimiter;
///
/// # async fn example(limiter: impl RateLimiter) -> Result<(), Box<dyn std::error::Error>> {
/// let decision = limiter
///     .allow("magic-link:user@example.com", RateLimitPolicy::per_minutes(3, 5))
///     .await?;
///
/// if !decision.allowed {
///     println!("retry in {:?}", decision.retry_after);
/// }
/// # Ok(())
/// # }
/// ```
pub trait RateLimiter: Send + Sync {
    /// Check and record one attempt in a single atomic operation.
    ///
    /// A denied attempt is not recorded, so the count never exceeds
    /// `policy.max_attempts` within a live window.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails. Callers must treat that as
    /// a failed request, never as "allowed".
    fn allow(
        &self,
        key: &str,
        policy: RateLimitPolicy,
    ) -> impl std::future::Future<Output = Result<RateLimitDecision>> + Send;

    /// Give back one attempt recorded by [`allow`](Self::allow).
    ///
    /// Used when the gated action failed after being allowed (for example
    /// the link could not be delivered), so the failure does not use up the
    /// caller's quota. The window itself is left untouched. A missing or
    /// already-zero counter is left as is.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails.
    fn refund(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Reset the counter for a key.
    ///
    /// Useful for:
    /// - Admin override
    /// - Testing
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails.
    fn reset(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Attempts recorded in the current window (0 if none is open).
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails.
    fn attempts(&self, key: &str) -> impl std::future::Future<Output = Result<u32>> + Send;
}
