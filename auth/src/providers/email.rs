//! Email provider trait.

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Email provider.
///
/// This trait abstracts over email delivery services
/// (SMTP relay, SendGrid, AWS SES, etc.). Delivery is fire-and-forget: the
/// provider reports success or failure and the flows never retry.
pub trait EmailProvider: Send + Sync {
    /// Send login link email.
    ///
    /// # Arguments
    ///
    /// - `to`: Recipient email address
    /// - `link`: Complete verification URL, token included
    /// - `expires_at`: Token expiration timestamp
    /// - `requested_from`: IP address the link was requested from
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Email provider rejects the request
    fn send_magic_link(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Send registration link email.
    ///
    /// # Arguments
    ///
    /// - `to`: Recipient email address
    /// - `name`: Display name captured at request time
    /// - `link`: Complete verification URL, token included
    /// - `expires_at`: Token expiration timestamp
    /// - `requested_from`: IP address the link was requested from
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Email provider rejects the request
    fn send_registration_link(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
