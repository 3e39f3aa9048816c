//! User repository trait.

use super::{NewUser, User};
use crate::error::Result;
use crate::state::UserId;

/// User repository.
///
/// The identity store. Login only reads from it; registration writes exactly
/// one record per redeemed registration link.
pub trait UserRepository: Send + Sync {
    /// Get user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database query fails
    /// - User not found → `AuthError::ResourceNotFound`
    fn get_user_by_id(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<User>> + Send;

    /// Get user by (normalized) email.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database query fails
    /// - User not found → `AuthError::ResourceNotFound`
    fn get_user_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<User>> + Send;

    /// Check if email exists.
    ///
    /// # Returns
    ///
    /// `true` if email is already registered.
    ///
    /// # Errors
    ///
    /// Returns error if database query fails.
    fn email_exists(&self, email: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Create user.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the email is already registered, leaving the existing
    /// record untouched.
    ///
    /// # Errors
    ///
    /// Returns error if database query fails.
    fn create_user(
        &self,
        user: NewUser,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;
}
