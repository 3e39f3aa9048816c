//! Authentication environment.
//!
//! This module defines the environment type for dependency injection
//! in the passwordless and impersonation flows.

use crate::config::PasswordlessConfig;
use crate::providers::{
    AssertionVerifier, EmailProvider, KeyValueStore, RateLimiter, SessionStore, UserRepository,
};
use crate::tokens::{TokenIssuer, TokenRedeemer};
use chrono::{DateTime, Utc};
use passlink_core::environment::{Clock, SharedClock};

/// Authentication environment.
///
/// Contains all external dependencies needed by the flows. There is no
/// global state: every flow call receives the environment explicitly, so
/// tests can swap in memory stores, mocks and a fixed clock.
///
/// # Type Parameters
///
/// - `K`: TTL key-value store (token records)
/// - `RL`: Rate limiter
/// - `E`: Email provider
/// - `U`: User repository
/// - `S`: Session store
/// - `V`: Identity assertion verifier
#[derive(Clone)]
pub struct AuthEnvironment<K, RL, E, U, S, V>
where
    K: KeyValueStore,
    RL: RateLimiter,
    E: EmailProvider,
    U: UserRepository,
    S: SessionStore,
    V: AssertionVerifier,
{
    /// TTL store (`Redis` in production, memory in tests).
    pub store: K,

    /// Rate limiter.
    pub rate_limiter: RL,

    /// Email provider.
    pub email: E,

    /// User repository (identity store).
    pub users: U,

    /// Session store.
    pub sessions: S,

    /// Identity assertion verifier (impersonation only).
    pub verifier: V,

    /// Time source for expiry and session timestamps.
    pub clock: SharedClock,

    /// Flow configuration.
    pub config: PasswordlessConfig,
}

impl<K, RL, E, U, S, V> AuthEnvironment<K, RL, E, U, S, V>
where
    K: KeyValueStore,
    RL: RateLimiter,
    E: EmailProvider,
    U: UserRepository,
    S: SessionStore,
    V: AssertionVerifier,
{
    /// Create a new authentication environment.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        store: K,
        rate_limiter: RL,
        email: E,
        users: U,
        sessions: S,
        verifier: V,
        clock: SharedClock,
        config: PasswordlessConfig,
    ) -> Self {
        Self {
            store,
            rate_limiter,
            email,
            users,
            sessions,
            verifier,
            clock,
            config,
        }
    }

    /// Current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Token issuer over this environment's store.
    #[must_use]
    pub fn issuer(&self) -> TokenIssuer<'_, K> {
        TokenIssuer::new(&self.store, self.clock.as_ref(), self.config.ttls)
    }

    /// Token redeemer over this environment's store.
    #[must_use]
    pub fn redeemer(&self) -> TokenRedeemer<'_, K> {
        TokenRedeemer::new(&self.store, self.clock.as_ref())
    }
}
