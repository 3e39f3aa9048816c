//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of the provider
//! traits that have no memory-backed store in [`crate::stores`], for use in
//! unit and integration tests.

pub mod email;
pub mod session;
pub mod user;
pub mod verifier;

pub use email::{MockEmailProvider, SentEmail, SentKind};
pub use session::MockSessionStore;
pub use user::MockUserRepository;
pub use verifier::MockAssertionVerifier;

use crate::config::PasswordlessConfig;
use crate::environment::AuthEnvironment;
use crate::stores::{MemoryRateLimiter, MemoryStore};
use passlink_core::environment::Clock;
use std::sync::Arc;

/// Environment wired entirely from memory stores and mocks.
pub type MockEnvironment<C> = AuthEnvironment<
    MemoryStore<C>,
    MemoryRateLimiter<C>,
    MockEmailProvider,
    MockUserRepository,
    MockSessionStore,
    MockAssertionVerifier,
>;

/// Build a [`MockEnvironment`] reading time from `clock`.
///
/// Token records and rate-limit counters live in separate memory stores, so
/// `env.store` only ever holds tokens.
#[must_use]
pub fn mock_environment<C>(clock: C, config: PasswordlessConfig) -> MockEnvironment<C>
where
    C: Clock + Clone + 'static,
{
    AuthEnvironment::new(
        MemoryStore::new(clock.clone()),
        MemoryRateLimiter::new(MemoryStore::new(clock.clone())),
        MockEmailProvider::new(),
        MockUserRepository::new(),
        MockSessionStore::new(),
        MockAssertionVerifier::new(),
        Arc::new(clock),
        config,
    )
}

#[cfg(test)]
pub(crate) type TestEnv = MockEnvironment<passlink_testing::FixedClock>;

/// Mock environment on a fixed clock with the default configuration.
#[cfg(test)]
pub(crate) fn test_env() -> TestEnv {
    passlink_testing::init_tracing();
    mock_environment(passlink_testing::test_clock(), PasswordlessConfig::default())
}
