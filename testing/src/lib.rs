//! # Passlink Testing
//!
//! Testing utilities and helpers for the passlink crates.
//!
//! This crate provides:
//! - A shared, manually advanced clock for deterministic expiry tests
//! - Tracing initialisation for test output
//!
//! ## Example
//!
//! ```
//! use passlink_testing::test_clock;
//! use passlink_core::environment::Clock;
//! use chrono::Duration;
//!
//! let clock = test_clock();
//! let start = clock.now();
//! clock.advance(Duration::minutes(15));
//! assert_eq!(clock.now() - start, Duration::minutes(15));
//! ```

use chrono::{DateTime, Utc};
use passlink_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until a test moves it with [`FixedClock::advance`]
    /// or [`FixedClock::set`]. Clones share the same underlying time, so a
    /// clone handed to a store moves together with the one the test holds.
    ///
    /// # Example
    ///
    /// ```
    /// use passlink_testing::mocks::FixedClock;
    /// use passlink_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward by `duration`.
        pub fn advance(&self, duration: chrono::Duration) {
            let mut guard = self
                .time
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard += duration;
        }

        /// Jump the clock to an absolute point in time.
        pub fn set(&self, time: DateTime<Utc>) {
            let mut guard = self
                .time
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = time;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self
                .time
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        let start = DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default();
        FixedClock::new(start)
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Honors `RUST_LOG`; defaults to `debug` for the passlink crates. Safe to
    /// call from every test, only the first call installs the subscriber.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("passlink_auth=debug,passlink_core=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::init_tracing;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_test_clock_starts_at_2025() {
        let clock = test_clock();
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_advance_is_shared_between_clones() {
        let clock = test_clock();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::seconds(90));

        assert_eq!(clock.now() - start, Duration::seconds(90));
    }

    #[test]
    fn test_set_jumps_to_absolute_time() {
        let clock = test_clock();
        let target = clock.now() + Duration::days(3);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
