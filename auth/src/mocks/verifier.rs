//! Mock identity assertion verifier for testing.

use crate::error::{AuthError, Result};
use crate::providers::{AssertionVerifier, VerifiedAssertion};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Registry {
    subjects: HashMap<String, String>,
    failure: Option<String>,
}

/// Mock assertion verifier.
///
/// Accepts only assertions registered with [`accept`](Self::accept) and
/// reports the subject they were registered for. Anything else is rejected.
#[derive(Debug, Clone, Default)]
pub struct MockAssertionVerifier {
    registry: Arc<Mutex<Registry>>,
}

impl MockAssertionVerifier {
    /// Create a verifier that rejects everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `assertion` as valid for `subject`.
    pub fn accept(&self, assertion: &str, subject: &str) {
        self.registry()
            .subjects
            .insert(assertion.to_string(), subject.to_string());
    }

    /// Fail every verification with `message`, as if the verifier were down.
    pub fn fail_with(&self, message: &str) {
        self.registry().failure = Some(message.to_string());
    }

    /// Stop failing.
    pub fn recover(&self) {
        self.registry().failure = None;
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AssertionVerifier for MockAssertionVerifier {
    fn verify(
        &self,
        assertion: &str,
    ) -> impl Future<Output = Result<Option<VerifiedAssertion>>> + Send {
        let registry = self.registry();
        let result = match &registry.failure {
            Some(message) => Err(AuthError::InternalError(message.clone())),
            None => Ok(registry
                .subjects
                .get(assertion)
                .map(|subject| VerifiedAssertion {
                    subject: subject.clone(),
                })),
        };
        drop(registry);

        async move { result }
    }
}
