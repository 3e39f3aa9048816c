//! # Passlink Core
//!
//! Environment traits shared by the passlink crates.
//!
//! Every component that needs the current time receives a [`Clock`] through
//! its environment instead of calling `Utc::now()` directly. Production code
//! injects [`SystemClock`]; tests inject a fixed or manually advanced clock so
//! that expiry and rate-limit windows are deterministic.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use passlink_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by `Utc::now()`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    impl<C: Clock + ?Sized> Clock for Arc<C> {
        fn now(&self) -> DateTime<Utc> {
            (**self).now()
        }
    }

    /// Shared, type-erased clock handle.
    pub type SharedClock = Arc<dyn Clock>;

    /// Convenience constructor for a shared system clock.
    #[must_use]
    pub fn system_clock() -> SharedClock {
        Arc::new(SystemClock)
    }
}
