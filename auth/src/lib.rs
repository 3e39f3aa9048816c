//! # Passlink Authentication
//!
//! Single-use bearer tokens for passwordless login and registration, and
//! for handing a time-boxed impersonation session to an operator.
//!
//! ## Features
//!
//! - **Single use**: every token is consumed by one atomic get-and-delete
//! - **Time boxed**: login 15 min, registration 30 min, impersonation 5 min
//! - **Rate limited**: fixed-window counters on both request and verify
//! - **Backend agnostic**: Redis in production, memory stores in tests
//! - **Testable**: all time flows through an injected clock
//!
//! ## Architecture
//!
//! ```text
//!             ┌──────────── flows ─────────────┐
//! request ──▶ │ Login / Registration / Imperso │ ──▶ Session
//!             └──┬──────────┬────────────┬─────┘
//!                │          │            │
//!         TokenIssuer  TokenRedeemer  RateLimiter
//!                └────┬─────┘            │
//!                 KeyValueStore ◀────────┘ (counters)
//! ```
//!
//! ## Example: Login Link
//!
//! ```rust,ignore
//! use passlink_auth::*;
//!
//! let env = AuthEnvironment::new(store, limiter, email, users, sessions, verifier,
//!     system_clock(), PasswordlessConfig::new("https://app.example.com"));
//!
//! // 1. Email a link
//! LoginFlow::new(&env).request_link("user@example.com", meta.clone()).await?;
//!
//! // 2. User clicks it
//! let session = LoginFlow::new(&env).verify_link(&token, meta).await?;
//! assert!(session.user.is_some());
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod flows;
pub mod metrics;
pub mod providers;
pub mod state;
pub mod stores;
pub mod tokens;
pub mod utils;

// Mock providers (for testing)
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::{PasswordlessConfig, RateLimitConfig, RateLimitPolicy, TokenTtls};
pub use environment::AuthEnvironment;
pub use error::{AuthError, ImpersonationError, RequestLinkError, Result, VerifyLinkError};
pub use flows::{ImpersonationFlow, LoginFlow, RegistrationFlow};
pub use state::{RequestMetadata, Session, SessionId, UserId};
pub use tokens::{TokenPayload, TokenPurpose, TokenRecord};
