//! Authentication constants.
//!
//! This module contains constant values used throughout the token core.

/// Login method identifiers recorded on sessions.
pub mod login_methods {
    /// Passwordless email login.
    pub const MAGIC_LINK: &str = "magic_link";

    /// Passwordless email registration.
    pub const MAGIC_LINK_REGISTRATION: &str = "magic_link_registration";

    /// Administrative impersonation.
    pub const IMPERSONATION: &str = "impersonation";
}

/// Rate-limit flow names. Counter keys are `{flow}:{subject}`.
pub mod rate_limit_flows {
    /// Login link requests, keyed by email.
    pub const LOGIN_REQUEST: &str = "magic-link";

    /// Login link verification, keyed by IP address.
    pub const LOGIN_VERIFY: &str = "magic-verify";

    /// Registration link requests, keyed by email.
    pub const REGISTRATION_REQUEST: &str = "magic-register";

    /// Registration link verification, keyed by IP address.
    pub const REGISTRATION_VERIFY: &str = "magic-register-verify";
}

/// Store key prefixes.
pub mod key_prefixes {
    /// Login and registration link tokens.
    ///
    /// Both purposes share one namespace so that redeeming a token with the
    /// wrong purpose still consumes it.
    pub const LINK_TOKEN: &str = "auth:link";

    /// Staged impersonation entries.
    pub const IMPERSONATION: &str = "auth:impersonation";

    /// Rate-limit counters.
    pub const RATE_LIMIT: &str = "rate_limit";

    /// Sessions persisted through a key-value store.
    pub const SESSION: &str = "auth:session";
}

/// Number of random bytes in a generated token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Maximum accepted length of an email address.
pub const MAX_EMAIL_LENGTH: usize = 255;

/// Minimum accepted length of a display name (in characters).
pub const MIN_NAME_LENGTH: usize = 2;

/// Maximum accepted length of a display name (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_method_constants() {
        assert_eq!(login_methods::MAGIC_LINK, "magic_link");
        assert_eq!(login_methods::IMPERSONATION, "impersonation");
    }

    #[test]
    fn test_rate_limit_key_format() {
        let key = format!("{}:{}", rate_limit_flows::LOGIN_REQUEST, "a@x.com");
        assert_eq!(key, "magic-link:a@x.com");
    }

    #[test]
    fn test_token_entropy_is_at_least_128_bits() {
        assert!(TOKEN_BYTES * 8 >= 128);
    }
}
