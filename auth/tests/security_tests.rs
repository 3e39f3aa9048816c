//! Security-focused integration tests.
//!
//! This module contains tests that verify critical security properties
//! of the token core, including:
//!
//! - Atomic token consumption (at most one winner under concurrency)
//! - Expiry enforced against the injected clock
//! - Purpose isolation between login, registration, and impersonation
//! - Rate limiting that counts failed attempts too

#![allow(clippy::unwrap_used)]

use chrono::Duration;
use passlink_auth::config::{RateLimitPolicy, TokenTtls};
use passlink_auth::mocks::mock_environment;
use passlink_auth::providers::{KeyValueStore, RateLimiter};
use passlink_auth::stores::{MemoryRateLimiter, MemoryStore};
use passlink_auth::tokens::{RedeemError, TokenIssuer, TokenRedeemer, token_key};
use passlink_auth::{
    LoginFlow, PasswordlessConfig, RequestMetadata, TokenPayload, TokenPurpose, VerifyLinkError,
};
use passlink_testing::{FixedClock, init_tracing, test_clock};
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn meta() -> RequestMetadata {
    RequestMetadata::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 50)), None)
}

fn login_payload() -> TokenPayload {
    TokenPayload::Login {
        email: "user@example.com".to_string(),
    }
}

async fn issue(store: &MemoryStore<FixedClock>, payload: TokenPayload) -> String {
    TokenIssuer::new(store, store.clock(), TokenTtls::default())
        .issue(payload, meta())
        .await
        .unwrap()
        .token
}

/// Many concurrent redemptions of one token: exactly one succeeds.
#[tokio::test]
async fn test_concurrent_redeem_has_single_winner() {
    init_tracing();
    let store = MemoryStore::new(test_clock());
    let token = issue(&store, login_payload()).await;

    let store = Arc::new(store);
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let store = Arc::clone(&store);
            let token = token.clone();
            tokio::spawn(async move {
                TokenRedeemer::new(store.as_ref(), store.clock())
                    .redeem(&token, TokenPurpose::Login)
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert_eq!(e, RedeemError::Invalid),
        }
    }

    assert_eq!(winners, 1);
    assert!(store.is_empty());
}

/// Concurrent login verifications of one link create exactly one session.
#[tokio::test]
async fn test_concurrent_verify_creates_single_session() {
    init_tracing();
    let env = mock_environment(test_clock(), PasswordlessConfig::default());
    env.users.insert_user("user@example.com", "User");
    LoginFlow::new(&env)
        .request_link("user@example.com", meta())
        .await
        .unwrap();
    let token = env.email.last_token().unwrap();

    // Distinct IPs so the verify limiter does not interfere
    let attempts = (0..4u8).map(|i| {
        let meta = RequestMetadata::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i)), None);
        let flow = LoginFlow::new(&env);
        let token = token.clone();
        async move { flow.verify_link(&token, meta).await }
    });
    let results = futures::future::join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == VerifyLinkError::InvalidOrExpired)
    );
    assert_eq!(env.sessions.session_count(), 1);
}

/// A record is honored up to and including `expires_at`, and refused one
/// second later.
#[tokio::test]
async fn test_expiry_boundary() {
    let clock = test_clock();
    let store = MemoryStore::new(clock.clone());

    let at_expiry = issue(&store, login_payload()).await;
    let after_expiry = issue(&store, login_payload()).await;

    clock.advance(Duration::minutes(15));
    let redeemer = TokenRedeemer::new(&store, &clock);
    redeemer.redeem(&at_expiry, TokenPurpose::Login).await.unwrap();

    clock.advance(Duration::seconds(1));
    let err = redeemer
        .redeem(&after_expiry, TokenPurpose::Login)
        .await
        .unwrap_err();
    assert!(matches!(err, RedeemError::Invalid | RedeemError::Expired));
}

/// A record whose own expiry has passed is refused even if the backend
/// still holds it.
#[tokio::test]
async fn test_record_expiry_checked_independently_of_store_ttl() {
    let clock = test_clock();
    let store = MemoryStore::new(clock.clone());
    let token = issue(&store, login_payload()).await;

    // Re-put the record with a much longer backend TTL
    let key = token_key(TokenPurpose::Login, &token);
    let value = store.get(&key).await.unwrap().into_option().unwrap();
    store.put(&key, value, Duration::hours(1)).await.unwrap();

    clock.advance(Duration::minutes(16));

    let err = TokenRedeemer::new(&store, &clock)
        .redeem(&token, TokenPurpose::Login)
        .await
        .unwrap_err();
    assert_eq!(err, RedeemError::Expired);

    // Consumed anyway
    assert!(store.is_empty());
}

/// A login token cannot be redeemed as a registration token, and the
/// attempt burns it.
#[tokio::test]
async fn test_purpose_isolation() {
    let store = MemoryStore::new(test_clock());
    let token = issue(&store, login_payload()).await;
    let redeemer = TokenRedeemer::new(&store, store.clock());

    let err = redeemer
        .redeem(&token, TokenPurpose::Registration)
        .await
        .unwrap_err();
    assert_eq!(err, RedeemError::Invalid);

    let err = redeemer.redeem(&token, TokenPurpose::Login).await.unwrap_err();
    assert_eq!(err, RedeemError::Invalid);
}

/// Raw tokens never appear in store keys.
#[tokio::test]
async fn test_store_keys_do_not_contain_token() {
    let store = MemoryStore::new(test_clock());
    let token = issue(&store, login_payload()).await;

    let key = token_key(TokenPurpose::Login, &token);
    assert!(!key.contains(&token));
    assert!(store.get(&key).await.unwrap().is_found());
}

/// Failed verifications count towards the per-IP limit.
#[tokio::test]
async fn test_failed_verifications_are_throttled() {
    init_tracing();
    let env = mock_environment(test_clock(), PasswordlessConfig::default());
    env.users.insert_user("user@example.com", "User");
    let flow = LoginFlow::new(&env);

    for _ in 0..5 {
        let err = flow.verify_link("guessed-token", meta()).await.unwrap_err();
        assert_eq!(err, VerifyLinkError::InvalidOrExpired);
    }

    // Even a genuine link is refused until the window rolls over
    flow.request_link("user@example.com", meta()).await.unwrap();
    let token = env.email.last_token().unwrap();
    let err = flow.verify_link(&token, meta()).await.unwrap_err();
    assert!(matches!(err, VerifyLinkError::RateLimited { .. }));

    // The refused attempt did not consume the link
    env.store.clock().advance(Duration::minutes(5) + Duration::seconds(1));
    flow.verify_link(&token, meta()).await.unwrap();
}

proptest! {
    /// However many attempts are made inside one window, exactly
    /// `min(attempts, max)` are allowed and the counter never exceeds `max`.
    #[test]
    fn prop_fixed_window_counter(max in 1u32..10, attempts in 0u32..30) {
        tokio_test::block_on(async {
            let limiter = MemoryRateLimiter::new(MemoryStore::new(test_clock()));
            let policy = RateLimitPolicy::per_minutes(max, 5);

            let mut allowed = 0;
            for _ in 0..attempts {
                if limiter.allow("prop", policy).await.unwrap().allowed {
                    allowed += 1;
                }
            }

            prop_assert_eq!(allowed, attempts.min(max));
            prop_assert!(limiter.attempts("prop").await.unwrap() <= max);
            Ok(())
        })?;
    }
}
