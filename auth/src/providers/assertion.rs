//! External identity assertion verifier.

use crate::error::Result;

/// Claims extracted from a verified assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    /// Subject claim (`sub`) of the assertion.
    pub subject: String,
}

/// Verifier for third-party signed identity assertions (for example a
/// Firebase or OIDC ID token).
///
/// Used only by the impersonation flow. Signature and issuer checks are the
/// implementation's concern; the flow compares the subject with the staged
/// account.
pub trait AssertionVerifier: Send + Sync {
    /// Verify `assertion` and return its claims.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(claims))` if the assertion is valid
    /// - `Ok(None)` if the assertion was rejected (bad signature, expired,
    ///   wrong audience)
    ///
    /// # Errors
    ///
    /// Returns error if the verifier itself failed (for example the key set
    /// could not be fetched).
    fn verify(
        &self,
        assertion: &str,
    ) -> impl std::future::Future<Output = Result<Option<VerifiedAssertion>>> + Send;
}
