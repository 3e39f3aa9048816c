//! Passwordless registration.
//!
//! Same shape as login, with three differences: the email must *not* be
//! registered yet, a display name is captured at request time, and a
//! redeemed link creates the account (with a verified email) before the
//! session is established. Registration links live for 30 minutes.

use super::{LinkSent, Registered, check_rate_limit, new_session, refund_rate_limit};
use crate::constants::{login_methods, rate_limit_flows};
use crate::environment::AuthEnvironment;
use crate::error::{RequestLinkError, VerifyLinkError};
use crate::metrics;
use crate::providers::{
    AssertionVerifier, EmailProvider, KeyValueStore, NewUser, RateLimiter, SessionStore,
    UserRepository,
};
use crate::state::{RequestMetadata, SessionUser};
use crate::tokens::{RedeemError, TokenPayload, TokenPurpose};
use crate::utils::{build_link, validate_email, validate_name};

const FLOW: &str = "registration";

/// Passwordless registration flow.
pub struct RegistrationFlow<'a, K, RL, E, U, S, V>
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

impl<'a, K, RL, E, U, S, V> RegistrationFlow<'a, K, RL, E, U, S, V>
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

    /// Send a registration link to `email`.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the name or email is malformed, or the email
    ///   is already registered
    /// - `RateLimited` after 3 requests for the same email in 5 minutes
    /// - `DeliveryFailed` if the email could not be sent (the link stays
    ///   valid until it expires and the attempt does not count against the
    ///   request limit)
    /// - `Store` on store or identity store failure
    pub async fn request_link(
        &self,
        name: &str,
        email: &str,
        metadata: RequestMetadata,
    ) -> Result<LinkSent, RequestLinkError> {
        let env = self.env;
        let name = validate_name(name)?;
        let email = validate_email(email)?;

        if env.users.email_exists(&email).await? {
            tracing::info!(
                ip_address = %metadata.ip_address,
                "Registration link requested for a registered email"
            );
            return Err(RequestLinkError::validation(
                "email",
                "This email address is already registered.",
            ));
        }

        let key = format!("{}:{email}", rate_limit_flows::REGISTRATION_REQUEST);
        if let Some(retry_after) = check_rate_limit(
            &env.rate_limiter,
            FLOW,
            &key,
            env.config.rate_limits.registration_request,
        )
        .await?
        {
            return Err(RequestLinkError::RateLimited { retry_after });
        }

        let issued = env
            .issuer()
            .issue(
                TokenPayload::Registration {
                    name: name.clone(),
                    email: email.clone(),
                },
                metadata.clone(),
            )
            .await?;
        metrics::increment(metrics::LINK_REQUESTED, FLOW);

        let link = build_link(&env.config.registration_verify_url, &issued.token);

        if let Err(e) = env
            .email
            .send_registration_link(&email, &name, &link, issued.expires_at, metadata.ip_address)
            .await
        {
            metrics::increment(metrics::LINK_DELIVERY_FAILED, FLOW);
            tracing::error!(
                error = %e,
                ip_address = %metadata.ip_address,
                "Failed to send registration link"
            );
            refund_rate_limit(&env.rate_limiter, FLOW, &key).await;
            return Err(RequestLinkError::DeliveryFailed {
                expires_at: issued.expires_at,
            });
        }

        tracing::info!(
            ip_address = %metadata.ip_address,
            expires_at = %issued.expires_at,
            "Registration link sent"
        );

        Ok(LinkSent {
            email,
            expires_at: issued.expires_at,
        })
    }

    /// Redeem a registration link, create the account and establish a
    /// session.
    ///
    /// # Errors
    ///
    /// - `RateLimited` after 5 attempts from the same IP in 5 minutes
    /// - `InvalidOrExpired` if the token is unknown, used, expired, or not a
    ///   registration token
    /// - `AccountAlreadyExists` if the email was registered after the link
    ///   was sent
    /// - `Store` on store, identity store, or session store failure
    pub async fn verify_link(
        &self,
        token: &str,
        metadata: RequestMetadata,
    ) -> Result<Registered, VerifyLinkError> {
        let env = self.env;

        let key = format!(
            "{}:{}",
            rate_limit_flows::REGISTRATION_VERIFY,
            metadata.ip_address
        );
        if let Some(retry_after) = check_rate_limit(
            &env.rate_limiter,
            FLOW,
            &key,
            env.config.rate_limits.registration_verify,
        )
        .await?
        {
            return Err(VerifyLinkError::RateLimited { retry_after });
        }

        let record = match env
            .redeemer()
            .redeem(token, TokenPurpose::Registration)
            .await
        {
            Ok(record) => record,
            Err(RedeemError::Store(e)) => return Err(e.into()),
            Err(RedeemError::Invalid | RedeemError::Expired) => {
                metrics::increment(metrics::LINK_REJECTED, FLOW);
                return Err(VerifyLinkError::InvalidOrExpired);
            }
        };

        let TokenPayload::Registration { name, email } = record.payload else {
            return Err(VerifyLinkError::InvalidOrExpired);
        };

        let Some(user) = env
            .users
            .create_user(NewUser {
                email,
                name,
                email_verified: true,
            })
            .await?
        else {
            tracing::warn!(
                ip_address = %metadata.ip_address,
                "Registration link redeemed for an email registered in the meantime"
            );
            return Err(VerifyLinkError::AccountAlreadyExists);
        };

        let session = new_session(
            &env.config,
            env.now(),
            Some(SessionUser::from(&user)),
            None,
            login_methods::MAGIC_LINK_REGISTRATION,
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
            "User registered via registration link"
        );

        Ok(Registered {
            session,
            user,
            created: true,
        })
    }
}
