//! Passwordless login.
//!
//! # Flow
//!
//! ```text
//! 1. User enters email          → request_link()
//!    - Email must belong to an existing account
//!    - 3 requests per 5 minutes per email
//!    - Token valid for 15 minutes, emailed as …/passwordless/verify/{token}
//!
//! 2. User clicks link           → verify_link()
//!    - 5 attempts per 5 minutes per IP, failures included
//!    - Token consumed atomically (single use)
//!    - Account re-checked, session established
//! ```

use super::{LinkSent, check_rate_limit, new_session, refund_rate_limit};
use crate::constants::{login_methods, rate_limit_flows};
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, RequestLinkError, VerifyLinkError};
use crate::metrics;
use crate::providers::{
    AssertionVerifier, EmailProvider, KeyValueStore, RateLimiter, SessionStore, UserRepository,
};
use crate::state::{RequestMetadata, Session, SessionUser};
use crate::tokens::{RedeemError, TokenPayload, TokenPurpose};
use crate::utils::{build_link, validate_email};

const FLOW: &str = "login";

/// Passwordless login flow.
///
/// # Example
///
/// ```no_run
/// # use passlink_auth::flows::LoginFlow;
/// # use passlink_auth::state::RequestMetadata;
/// # async fn example<K, RL, E, U, S, V>(env: &passlink_auth::AuthEnvironment<K, RL, E, U, S, V>) -> Result<(), Box<dyn std::error::Error>>
/// # where
/// #     K: passlink_auth::providers::KeyValueStore,
/// #     RL: passlink_auth::providers::RateLimiter,
/// #     E: passlink_auth::providers::EmailProvider,
/// #     U: passlink_auth::providers::UserRepository,
/// #     S: passlink_auth::providers::SessionStore,
/// #     V: passlink_auth::providers::AssertionVerifier,
/// # {
/// let meta = RequestMetadata::new("203.0.113.7".parse()?, None);
///
/// LoginFlow::new(env).request_link("user@example.com", meta.clone()).await?;
///
/// // Later, from the link in the email
/// let session = LoginFlow::new(env).verify_link("token-from-link", meta).await?;
/// # Ok(())
/// # }
/// ```
pub struct LoginFlow<'a, K, RL, E, U, S, V>
where
    K: KeyValueStore,
    RL: RateLimiter,
    E: EmailProvider,
    U: UserRepository,
    S: SessionStore,
    V: AssertionVerifier,
{
    env: &'a AuthEnvironment<K, RL, E, U, S, V>,
}

impl<'a, K, RL, E, U, S, V> LoginFlow<'a, K, RL, E, U, S, V>
where
    K: KeyValueStore,
    RL: RateLimiter,
    E: EmailProvider,
    U: UserRepository,
    S: SessionStore,
    V: AssertionVerifier,
{
    /// Create the flow over `env`.
    #[must_use]
    pub const fn new(env: &'a AuthEnvironment<K, RL, E, U, S, V>) -> Self {
        Self { env }
    }

    /// Send a login link to `email`.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the email is malformed or has no account
    /// - `RateLimited` after 3 requests for the same email in 5 minutes
    /// - `DeliveryFailed` if the email could not be sent (the link stays
    ///   valid until it expires and the attempt does not count against the
    ///   request limit)
    /// - `Store` on store or identity store failure
    pub async fn request_link(
        &self,
        email: &str,
        metadata: RequestMetadata,
    ) -> Result<LinkSent, RequestLinkError> {
        let env = self.env;
        let email = validate_email(email)?;

        match env.users.get_user_by_email(&email).await {
            Ok(_) => {}
            Err(AuthError::ResourceNotFound) => {
                tracing::info!(ip_address = %metadata.ip_address, "Login link requested for unknown email");
                return Err(RequestLinkError::validation(
                    "email",
                    "We cannot find a user with that email address.",
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let key = format!("{}:{email}", rate_limit_flows::LOGIN_REQUEST);
        if let Some(retry_after) =
            check_rate_limit(&env.rate_limiter, FLOW, &key, env.config.rate_limits.login_request)
                .await?
        {
            return Err(RequestLinkError::RateLimited { retry_after });
        }

        let issued = env
            .issuer()
            .issue(
                TokenPayload::Login {
                    email: email.clone(),
                },
                metadata.clone(),
            )
            .await?;
        metrics::increment(metrics::LINK_REQUESTED, FLOW);

        let link = build_link(&env.config.login_verify_url, &issued.token);

        if let Err(e) = env
            .email
            .send_magic_link(&email, &link, issued.expires_at, metadata.ip_address)
            .await
        {
            metrics::increment(metrics::LINK_DELIVERY_FAILED, FLOW);
            tracing::error!(
                error = %e,
                ip_address = %metadata.ip_address,
                "Failed to send login link"
            );
            refund_rate_limit(&env.rate_limiter, FLOW, &key).await;
            return Err(RequestLinkError::DeliveryFailed {
                expires_at: issued.expires_at,
            });
        }

        tracing::info!(
            ip_address = %metadata.ip_address,
            expires_at = %issued.expires_at,
            "Login link sent"
        );

        Ok(LinkSent {
            email,
            expires_at: issued.expires_at,
        })
    }

    /// Redeem a login link and establish a session.
    ///
    /// Every call counts against the per-IP limiter, whether or not the
    /// token turns out to be valid.
    ///
    /// # Errors
    ///
    /// - `RateLimited` after 5 attempts from the same IP in 5 minutes
    /// - `InvalidOrExpired` if the token is unknown, used, expired, or not a
    ///   login token
    /// - `AccountNotFound` if the account was removed after the link was sent
    /// - `Store` on store, identity store, or session store failure
    pub async fn verify_link(
        &self,
        token: &str,
        metadata: RequestMetadata,
    ) -> Result<Session, VerifyLinkError> {
        let env = self.env;

        let key = format!("{}:{}", rate_limit_flows::LOGIN_VERIFY, metadata.ip_address);
        if let Some(retry_after) =
            check_rate_limit(&env.rate_limiter, FLOW, &key, env.config.rate_limits.login_verify)
                .await?
        {
            return Err(VerifyLinkError::RateLimited { retry_after });
        }

        let record = match env.redeemer().redeem(token, TokenPurpose::Login).await {
            Ok(record) => record,
            Err(RedeemError::Store(e)) => return Err(e.into()),
            Err(RedeemError::Invalid | RedeemError::Expired) => {
                metrics::increment(metrics::LINK_REJECTED, FLOW);
                return Err(VerifyLinkError::InvalidOrExpired);
            }
        };

        let TokenPayload::Login { email } = record.payload else {
            return Err(VerifyLinkError::InvalidOrExpired);
        };

        let user = match env.users.get_user_by_email(&email).await {
            Ok(user) => user,
            Err(AuthError::ResourceNotFound) => {
                tracing::warn!(
                    ip_address = %metadata.ip_address,
                    "Login link redeemed for an account that no longer exists"
                );
                return Err(VerifyLinkError::AccountNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let session = new_session(
            &env.config,
            env.now(),
            Some(SessionUser::from(&user)),
            None,
            login_methods::MAGIC_LINK,
            metadata,
        );
        env.sessions
            .create_session(&session, env.config.session_duration)
            .await?;

        metrics::increment(metrics::LINK_VERIFIED, FLOW);
        tracing::info!(
            user_id = %user.user_id,
            session_id = %session.session_id,
            ip_address = %session.ip_address,
            "User logged in via login link"
        );

        Ok(session)
    }
}
