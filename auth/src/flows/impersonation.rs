//! Impersonation hand-off.
//!
//! An administrative surface stages `{subject_id, display_name, assertion}`
//! under a lookup key it chooses. The operator's browser then polls
//! [`ImpersonationFlow::check`] until the entry shows up and calls
//! [`ImpersonationFlow::process`] once to consume it and obtain a session
//! flagged as impersonated.
//!
//! # Lifecycle
//!
//! ```text
//! stage ──▶ STAGED ──check──▶ STAGED (no side effect)
//!              │     └─check (expired/rejected)──▶ GONE
//!              └─process──▶ GONE ──▶ session.impersonation = Some(..)
//!                                         └─end──▶ session.impersonation = None
//! ```
//!
//! Process consumes the entry before verifying the assertion, so a rejected
//! assertion can never be replayed.

use super::{ImpersonationCheck, ImpersonationStarted, ImpersonationStatus, new_session};
use crate::constants::login_methods;
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, ImpersonationError};
use crate::metrics;
use crate::providers::{
    AssertionVerifier, EmailProvider, KeyValueStore, RateLimiter, SessionStore, UserRepository,
};
use crate::state::{Impersonation, RequestMetadata, SessionId};
use crate::tokens::{IssuedToken, RedeemError, TokenPayload, TokenPurpose};

const FLOW: &str = "impersonation";

/// Impersonation flow.
pub struct ImpersonationFlow<'a, K, RL, E, U, S, V>
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

impl<'a, K, RL, E, U, S, V> ImpersonationFlow<'a, K, RL, E, U, S, V>
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

    /// Stage an impersonation under `lookup_key` for 5 minutes.
    ///
    /// Re-staging under the same key replaces the previous entry.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the key, subject, or assertion is empty
    /// - `Store` if the store write fails
    pub async fn stage(
        &self,
        lookup_key: &str,
        subject_id: &str,
        display_name: &str,
        assertion: &str,
        metadata: RequestMetadata,
    ) -> Result<IssuedToken, ImpersonationError> {
        for (value, message) in [
            (lookup_key, "impersonation_key is required"),
            (subject_id, "subject_id is required"),
            (assertion, "assertion is required"),
        ] {
            if value.trim().is_empty() {
                return Err(ImpersonationError::ValidationFailed {
                    message: message.to_string(),
                });
            }
        }

        let issued = self
            .env
            .issuer()
            .issue_at(
                lookup_key,
                TokenPayload::Impersonation {
                    subject_id: subject_id.to_string(),
                    display_name: display_name.to_string(),
                    assertion: assertion.to_string(),
                },
                metadata,
            )
            .await?;

        Ok(issued)
    }

    /// Poll for a staged impersonation without consuming it.
    ///
    /// An expired, unreadable, or rejected entry is deleted so polling does
    /// not accumulate stale entries. A verifier outage or a subject mismatch
    /// reports `false` but leaves the entry for [`process`](Self::process)
    /// to settle.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the store fails.
    pub async fn check(&self, lookup_key: &str) -> Result<ImpersonationCheck, ImpersonationError> {
        let env = self.env;
        let redeemer = env.redeemer();

        let Some(record) = redeemer.peek(lookup_key, TokenPurpose::Impersonation).await? else {
            tracing::debug!("No staged impersonation");
            return Ok(ImpersonationCheck::default());
        };

        let TokenPayload::Impersonation {
            subject_id,
            display_name,
            assertion,
        } = record.payload
        else {
            return Ok(ImpersonationCheck::default());
        };

        match env.verifier.verify(&assertion).await {
            Ok(Some(verified)) if verified.subject == subject_id => Ok(ImpersonationCheck {
                has_impersonation: true,
                subject_id: Some(subject_id),
                display_name: Some(display_name),
                assertion: Some(assertion),
            }),
            Ok(Some(_)) => {
                tracing::warn!(subject_id = %subject_id, "Staged assertion names another subject");
                Ok(ImpersonationCheck::default())
            }
            Ok(None) => {
                tracing::warn!(subject_id = %subject_id, "Staged assertion rejected, discarding");
                redeemer
                    .discard(lookup_key, TokenPurpose::Impersonation)
                    .await?;
                Ok(ImpersonationCheck::default())
            }
            Err(e) => {
                tracing::error!(error = %e, "Assertion verifier failed during check");
                Ok(ImpersonationCheck::default())
            }
        }
    }

    /// Consume a staged impersonation and establish an impersonating
    /// session.
    ///
    /// # Errors
    ///
    /// - `NotFound` if nothing is staged under `lookup_key` (or it was
    ///   already consumed)
    /// - `Expired` if the backend still held the entry past the record's
    ///   own expiry. The memory and `Redis` stores drop entries at that
    ///   instant, so with them an expired hand-off reports `NotFound`.
    /// - `AssertionInvalid` if the verifier rejects the assertion or it
    ///   names a different subject
    /// - `Store` on store, verifier, or session store failure
    ///
    /// The entry is gone afterwards in every case.
    pub async fn process(
        &self,
        lookup_key: &str,
        metadata: RequestMetadata,
    ) -> Result<ImpersonationStarted, ImpersonationError> {
        let env = self.env;

        let record = match env
            .redeemer()
            .redeem(lookup_key, TokenPurpose::Impersonation)
            .await
        {
            Ok(record) => record,
            Err(RedeemError::Store(e)) => return Err(e.into()),
            Err(RedeemError::Invalid) => {
                metrics::increment(metrics::IMPERSONATION_REJECTED, FLOW);
                return Err(ImpersonationError::NotFound);
            }
            Err(RedeemError::Expired) => {
                metrics::increment(metrics::IMPERSONATION_REJECTED, FLOW);
                return Err(ImpersonationError::Expired);
            }
        };

        let TokenPayload::Impersonation {
            subject_id,
            display_name,
            assertion,
        } = record.payload
        else {
            return Err(ImpersonationError::NotFound);
        };

        let reason = match env.verifier.verify(&assertion).await? {
            Some(verified) if verified.subject == subject_id => None,
            Some(_) => Some("subject mismatch"),
            None => Some("assertion rejected"),
        };
        if let Some(reason) = reason {
            metrics::increment(metrics::IMPERSONATION_REJECTED, FLOW);
            tracing::warn!(
                subject_id = %subject_id,
                ip_address = %metadata.ip_address,
                reason = reason,
                "Impersonation rejected"
            );
            return Err(ImpersonationError::AssertionInvalid {
                reason: reason.to_string(),
            });
        }

        let now = env.now();
        let session = new_session(
            &env.config,
            now,
            None,
            Some(Impersonation {
                subject_id: subject_id.clone(),
                display_name: display_name.clone(),
                impersonated_at: now,
            }),
            login_methods::IMPERSONATION,
            metadata,
        );
        env.sessions
            .create_session(&session, env.config.session_duration)
            .await?;

        metrics::increment(metrics::IMPERSONATION_STARTED, FLOW);
        tracing::info!(
            subject_id = %subject_id,
            display_name = %display_name,
            session_id = %session.session_id,
            ip_address = %session.ip_address,
            "Impersonation started"
        );

        Ok(ImpersonationStarted {
            session,
            subject_id,
            display_name,
        })
    }

    /// Clear the impersonation flags of a session.
    ///
    /// Does not touch the token store. Ending on a session that is gone or
    /// not impersonating succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the session store fails.
    pub async fn end(&self, session_id: SessionId) -> Result<(), ImpersonationError> {
        let env = self.env;

        let mut session = match env.sessions.get_session(session_id).await {
            Ok(session) => session,
            Err(AuthError::SessionNotFound) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let Some(impersonation) = session.impersonation.take() else {
            return Ok(());
        };

        env.sessions.update_session(&session).await?;

        tracing::info!(
            subject_id = %impersonation.subject_id,
            session_id = %session_id,
            "Impersonation ended"
        );

        Ok(())
    }

    /// Impersonation state of a session.
    ///
    /// A missing session reports "not impersonated".
    ///
    /// # Errors
    ///
    /// Returns `Store` if the session store fails.
    pub async fn status(&self, session_id: SessionId) -> Result<ImpersonationStatus, ImpersonationError> {
        match self.env.sessions.get_session(session_id).await {
            Ok(session) => Ok(ImpersonationStatus::from(&session)),
            Err(AuthError::SessionNotFound) => Ok(ImpersonationStatus::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{TestEnv, test_env};
    use std::net::{IpAddr, Ipv4Addr};

    const KEY: &str = "impersonate-7f3a";

    fn meta() -> RequestMetadata {
        RequestMetadata::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), None)
    }

    async fn staged(assertion: &str) -> TestEnv {
        let env = test_env();
        env.verifier.accept("sig-good", "uid-42");
        env.verifier.accept("sig-other", "uid-99");
        ImpersonationFlow::new(&env)
            .stage(KEY, "uid-42", "Corner Bistro", assertion, meta())
            .await
            .unwrap();
        env
    }

    #[tokio::test]
    async fn test_stage_requires_key_subject_and_assertion() {
        let env = test_env();
        let flow = ImpersonationFlow::new(&env);

        let err = flow.stage(" ", "uid", "n", "sig", meta()).await.unwrap_err();
        assert!(matches!(err, ImpersonationError::ValidationFailed { .. }));

        let err = flow.stage(KEY, "", "n", "sig", meta()).await.unwrap_err();
        assert!(matches!(err, ImpersonationError::ValidationFailed { .. }));

        let err = flow.stage(KEY, "uid", "n", "", meta()).await.unwrap_err();
        assert!(matches!(err, ImpersonationError::ValidationFailed { .. }));
        assert!(env.store.is_empty());
    }

    #[tokio::test]
    async fn test_check_is_non_consuming() {
        let env = staged("sig-good").await;
        let flow = ImpersonationFlow::new(&env);

        let first = flow.check(KEY).await.unwrap();
        let second = flow.check(KEY).await.unwrap();

        assert!(first.has_impersonation);
        assert_eq!(first.subject_id.as_deref(), Some("uid-42"));
        assert_eq!(first.display_name.as_deref(), Some("Corner Bistro"));
        assert_eq!(first, second);
        assert_eq!(env.store.len(), 1);
    }

    #[tokio::test]
    async fn test_check_on_unknown_key() {
        let env = test_env();
        let check = ImpersonationFlow::new(&env).check("nope").await.unwrap();
        assert_eq!(check, ImpersonationCheck::default());
    }

    #[tokio::test]
    async fn test_check_discards_expired_entry() {
        let env = staged("sig-good").await;
        env.store.clock().advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));

        let check = ImpersonationFlow::new(&env).check(KEY).await.unwrap();

        assert!(!check.has_impersonation);
        assert!(env.store.is_empty());
    }

    #[tokio::test]
    async fn test_check_discards_rejected_assertion() {
        let env = staged("sig-forged").await;

        let check = ImpersonationFlow::new(&env).check(KEY).await.unwrap();

        assert!(!check.has_impersonation);
        assert!(env.store.is_empty());
    }

    #[tokio::test]
    async fn test_check_keeps_entry_on_verifier_outage() {
        let env = staged("sig-good").await;
        env.verifier.fail_with("key set unavailable");

        let check = ImpersonationFlow::new(&env).check(KEY).await.unwrap();

        assert!(!check.has_impersonation);
        assert_eq!(env.store.len(), 1);
    }

    #[tokio::test]
    async fn test_process_establishes_impersonated_session() {
        let env = staged("sig-good").await;

        let started = ImpersonationFlow::new(&env)
            .process(KEY, meta())
            .await
            .unwrap();

        assert_eq!(started.subject_id, "uid-42");
        assert_eq!(started.display_name, "Corner Bistro");
        assert!(started.session.is_impersonated());
        assert_eq!(started.session.login_method, login_methods::IMPERSONATION);
        assert_eq!(
            started.session.impersonation.as_ref().unwrap().impersonated_at,
            env.now()
        );
        assert!(env.store.is_empty());

        let again = ImpersonationFlow::new(&env).process(KEY, meta()).await;
        assert_eq!(again.unwrap_err(), ImpersonationError::NotFound);
    }

    #[tokio::test]
    async fn test_process_rejects_subject_mismatch_and_consumes() {
        let env = staged("sig-other").await;

        let err = ImpersonationFlow::new(&env)
            .process(KEY, meta())
            .await
            .unwrap_err();

        assert!(matches!(err, ImpersonationError::AssertionInvalid { .. }));
        assert!(env.store.is_empty());
    }

    #[tokio::test]
    async fn test_process_after_expiry_reports_not_found() {
        let env = staged("sig-good").await;
        env.store.clock().advance(chrono::Duration::minutes(6));

        let err = ImpersonationFlow::new(&env)
            .process(KEY, meta())
            .await
            .unwrap_err();

        // The memory store drops the entry at its expiry
        assert_eq!(err, ImpersonationError::NotFound);
        assert!(env.store.is_empty());
    }

    #[tokio::test]
    async fn test_process_reports_expired_when_backend_outlives_record() {
        let env = staged("sig-good").await;

        // Re-put under a backend TTL longer than the record's expiry
        let key = crate::tokens::token_key(TokenPurpose::Impersonation, KEY);
        let value = env.store.get(&key).await.unwrap().into_option().unwrap();
        env.store
            .put(&key, value, chrono::Duration::hours(1))
            .await
            .unwrap();

        env.store.clock().advance(chrono::Duration::minutes(6));

        let err = ImpersonationFlow::new(&env)
            .process(KEY, meta())
            .await
            .unwrap_err();

        assert_eq!(err, ImpersonationError::Expired);
        assert!(env.store.is_empty());
        assert_eq!(env.sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn test_end_clears_flags_only() {
        let env = staged("sig-good").await;
        let flow = ImpersonationFlow::new(&env);
        let started = flow.process(KEY, meta()).await.unwrap();
        let id = started.session.session_id;

        let status = flow.status(id).await.unwrap();
        assert!(status.is_impersonated);
        assert_eq!(status.subject_id.as_deref(), Some("uid-42"));

        flow.end(id).await.unwrap();

        let session = env.sessions.get_session(id).await.unwrap();
        assert!(!session.is_impersonated());
        assert_eq!(flow.status(id).await.unwrap(), ImpersonationStatus::default());

        // Ending twice, or on a missing session, is fine
        flow.end(id).await.unwrap();
        flow.end(SessionId::new()).await.unwrap();
    }
}
