//! Passwordless configuration.
//!
//! This module provides configuration structures for the token core and the
//! flows built on it. Configuration values should be provided by the
//! application, not hardcoded; the defaults encode the recommended policy.

use crate::tokens::TokenPurpose;
use chrono::Duration;

/// Token lifetimes per purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    /// Login link lifetime.
    ///
    /// Default: 15 minutes
    pub login: Duration,

    /// Registration link lifetime.
    ///
    /// Default: 30 minutes
    pub registration: Duration,

    /// Staged impersonation lifetime.
    ///
    /// Default: 5 minutes
    pub impersonation: Duration,
}

impl TokenTtls {
    /// Lifetime of a token issued for `purpose`.
    #[must_use]
    pub const fn for_purpose(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Login => self.login,
            TokenPurpose::Registration => self.registration,
            TokenPurpose::Impersonation => self.impersonation,
        }
    }

    /// Set login link lifetime.
    #[must_use]
    pub const fn with_login(mut self, ttl: Duration) -> Self {
        self.login = ttl;
        self
    }

    /// Set registration link lifetime.
    #[must_use]
    pub const fn with_registration(mut self, ttl: Duration) -> Self {
        self.registration = ttl;
        self
    }

    /// Set impersonation lifetime.
    #[must_use]
    pub const fn with_impersonation(mut self, ttl: Duration) -> Self {
        self.impersonation = ttl;
        self
    }
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            login: Duration::minutes(15),
            registration: Duration::minutes(30),
            impersonation: Duration::minutes(5),
        }
    }
}

/// Fixed-window rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum attempts allowed in one window.
    pub max_attempts: u32,

    /// Window length.
    pub window: std::time::Duration,
}

impl RateLimitPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, window: std::time::Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    /// Create a policy with a window expressed in minutes.
    #[must_use]
    pub const fn per_minutes(max_attempts: u32, minutes: u64) -> Self {
        Self::new(max_attempts, std::time::Duration::from_secs(minutes * 60))
    }
}

/// Rate-limit policies for each gated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Login link requests per email.
    ///
    /// Default: 3 per 5 minutes
    pub login_request: RateLimitPolicy,

    /// Login link verifications per IP.
    ///
    /// Default: 5 per 5 minutes
    pub login_verify: RateLimitPolicy,

    /// Registration link requests per email.
    ///
    /// Default: 3 per 5 minutes
    pub registration_request: RateLimitPolicy,

    /// Registration link verifications per IP.
    ///
    /// Default: 5 per 5 minutes
    pub registration_verify: RateLimitPolicy,
}

impl RateLimitConfig {
    /// Set the login request policy.
    #[must_use]
    pub const fn with_login_request(mut self, policy: RateLimitPolicy) -> Self {
        self.login_request = policy;
        self
    }

    /// Set the login verification policy.
    #[must_use]
    pub const fn with_login_verify(mut self, policy: RateLimitPolicy) -> Self {
        self.login_verify = policy;
        self
    }

    /// Set the registration request policy.
    #[must_use]
    pub const fn with_registration_request(mut self, policy: RateLimitPolicy) -> Self {
        self.registration_request = policy;
        self
    }

    /// Set the registration verification policy.
    #[must_use]
    pub const fn with_registration_verify(mut self, policy: RateLimitPolicy) -> Self {
        self.registration_verify = policy;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_request: RateLimitPolicy::per_minutes(3, 5),
            login_verify: RateLimitPolicy::per_minutes(5, 5),
            registration_request: RateLimitPolicy::per_minutes(3, 5),
            registration_verify: RateLimitPolicy::per_minutes(5, 5),
        }
    }
}

/// Passwordless flow configuration.
#[derive(Debug, Clone)]
pub struct PasswordlessConfig {
    /// Base URL of the login verification endpoint.
    ///
    /// Links are formatted as `{login_verify_url}/{token}`.
    pub login_verify_url: String,

    /// Base URL of the registration verification endpoint.
    ///
    /// Links are formatted as `{registration_verify_url}/{token}`.
    pub registration_verify_url: String,

    /// Session duration after successful authentication.
    ///
    /// Default: 24 hours
    pub session_duration: Duration,

    /// Token lifetimes.
    pub ttls: TokenTtls,

    /// Rate-limit policies.
    pub rate_limits: RateLimitConfig,
}

impl PasswordlessConfig {
    /// Create new configuration.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL for your application (e.g., "https://app.example.com")
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            login_verify_url: format!("{base}/passwordless/verify"),
            registration_verify_url: format!("{base}/passwordless/register/verify"),
            session_duration: Duration::hours(24),
            ttls: TokenTtls::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }

    /// Set session duration.
    #[must_use]
    pub const fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set token lifetimes.
    #[must_use]
    pub const fn with_ttls(mut self, ttls: TokenTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Set rate-limit policies.
    #[must_use]
    pub const fn with_rate_limits(mut self, rate_limits: RateLimitConfig) -> Self {
        self.rate_limits = rate_limits;
        self
    }
}

impl Default for PasswordlessConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passwordless_config_builder() {
        let config = PasswordlessConfig::new("https://example.com/")
            .with_session_duration(Duration::hours(48))
            .with_ttls(TokenTtls::default().with_login(Duration::minutes(10)));

        assert_eq!(
            config.login_verify_url,
            "https://example.com/passwordless/verify"
        );
        assert_eq!(
            config.registration_verify_url,
            "https://example.com/passwordless/register/verify"
        );
        assert_eq!(config.session_duration, Duration::hours(48));
        assert_eq!(config.ttls.login, Duration::minutes(10));
        assert_eq!(config.ttls.registration, Duration::minutes(30));
    }

    #[test]
    fn test_default_ttls() {
        let ttls = TokenTtls::default();
        assert_eq!(ttls.login, Duration::minutes(15));
        assert_eq!(ttls.registration, Duration::minutes(30));
        assert_eq!(ttls.impersonation, Duration::minutes(5));
        assert_eq!(ttls.for_purpose(TokenPurpose::Registration), ttls.registration);
    }

    #[test]
    fn test_default_rate_limits() {
        let limits = RateLimitConfig::default();
        assert_eq!(limits.login_request.max_attempts, 3);
        assert_eq!(limits.login_verify.max_attempts, 5);
        assert_eq!(limits.registration_request.max_attempts, 3);
        assert_eq!(limits.registration_verify.max_attempts, 5);
        assert_eq!(
            limits.login_request.window,
            std::time::Duration::from_secs(300)
        );
    }

    #[test]
    fn test_rate_limit_override() {
        let limits = RateLimitConfig::default()
            .with_login_verify(RateLimitPolicy::per_minutes(10, 1));
        assert_eq!(limits.login_verify.max_attempts, 10);
        assert_eq!(limits.login_verify.window, std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_default_config() {
        let config = PasswordlessConfig::default();
        assert_eq!(
            config.login_verify_url,
            "http://localhost:3000/passwordless/verify"
        );
        assert_eq!(config.session_duration, Duration::hours(24));
    }
}
