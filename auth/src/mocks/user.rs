//! Mock user repository for testing.

use crate::error::{AuthError, Result};
use crate::providers::{NewUser, User, UserRepository};
use crate::state::UserId;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Mock user repository.
///
/// Uses in-memory storage for testing. Users are keyed by email; lookups
/// expect an already normalized address, as the flows pass one.
#[derive(Debug, Clone, Default)]
pub struct MockUserRepository {
    users_by_email: Arc<Mutex<HashMap<String, User>>>,
}

impl MockUserRepository {
    /// Create a new mock user repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a verified user directly (test setup).
    pub fn insert_user(&self, email: &str, name: &str) -> User {
        let now = Utc::now();
        let user = User {
            user_id: UserId::new(),
            email: email.to_string(),
            name: Some(name.to_string()),
            email_verified: true,
            created_at: now,
            updated_at: now,
        };

        self.users_by_email
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.email.clone(), user.clone());

        user
    }

    /// Remove a user directly (test setup).
    pub fn remove_user(&self, email: &str) {
        self.users_by_email
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(email);
    }

    /// Number of stored users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users_by_email
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn lock_failed<T>(_: PoisonError<T>) -> AuthError {
    AuthError::InternalError("Mutex lock failed".to_string())
}

impl UserRepository for MockUserRepository {
    fn get_user_by_id(&self, user_id: UserId) -> impl Future<Output = Result<User>> + Send {
        let users_by_email = Arc::clone(&self.users_by_email);

        async move {
            users_by_email
                .lock()
                .map_err(lock_failed)?
                .values()
                .find(|u| u.user_id == user_id)
                .cloned()
                .ok_or(AuthError::ResourceNotFound)
        }
    }

    fn get_user_by_email(&self, email: &str) -> impl Future<Output = Result<User>> + Send {
        let users_by_email = Arc::clone(&self.users_by_email);
        let email = email.to_string();

        async move {
            users_by_email
                .lock()
                .map_err(lock_failed)?
                .get(&email)
                .cloned()
                .ok_or(AuthError::ResourceNotFound)
        }
    }

    fn email_exists(&self, email: &str) -> impl Future<Output = Result<bool>> + Send {
        let users_by_email = Arc::clone(&self.users_by_email);
        let email = email.to_string();

        async move { Ok(users_by_email.lock().map_err(lock_failed)?.contains_key(&email)) }
    }

    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<Option<User>>> + Send {
        let users_by_email = Arc::clone(&self.users_by_email);

        async move {
            let mut email_guard = users_by_email.lock().map_err(lock_failed)?;

            // Check if email already exists
            if email_guard.contains_key(&user.email) {
                return Ok(None);
            }

            let now = Utc::now();
            let created = User {
                user_id: UserId::new(),
                email: user.email,
                name: Some(user.name),
                email_verified: user.email_verified,
                created_at: now,
                updated_at: now,
            };
            email_guard.insert(created.email.clone(), created.clone());

            Ok(Some(created))
        }
    }
}
