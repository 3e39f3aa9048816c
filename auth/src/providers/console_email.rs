//! Console email provider for development.

use crate::error::Result;
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use tracing::info;

/// Console email provider.
///
/// Prints link emails to stdout instead of sending them. The link itself is
/// printed but never passed to `tracing`, so it does not end up in log
/// aggregation.
///
/// # Examples
///
/// ```ignore
/// use passlink_auth::providers::ConsoleEmailProvider;
///
/// let provider = ConsoleEmailProvider::new();
/// provider.send_magic_link(
///     "user@example.com",
///     "https://app.example.com/passwordless/verify/abc123",
///     Utc::now() + chrono::Duration::minutes(15),
///     "127.0.0.1".parse()?,
/// ).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConsoleEmailProvider;

impl ConsoleEmailProvider {
    /// Create a new console email provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn print_box(title: &str, to: &str, subject: &str, body: &[String]) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║ {title:<61}║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ To: {to:<57}║");
        println!("║ Subject: {subject:<52}║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        for line in body {
            println!("║ {line:<61}║");
        }
        println!("╚══════════════════════════════════════════════════════════════╝\n");
    }
}

impl EmailProvider for ConsoleEmailProvider {
    async fn send_magic_link(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> Result<()> {
        info!(
            to = %to,
            expires_at = %expires_at,
            requested_from = %requested_from,
            "Login link email (development mode)"
        );

        Self::print_box(
            "LOGIN LINK EMAIL",
            to,
            "Your login link",
            &[
                String::new(),
                "Click the link below to log in.".to_string(),
                format!("This link expires at {}.", expires_at.format("%H:%M UTC")),
                String::new(),
                link.to_string(),
                String::new(),
                format!("Requested from {requested_from}."),
            ],
        );

        Ok(())
    }

    async fn send_registration_link(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> Result<()> {
        info!(
            to = %to,
            expires_at = %expires_at,
            requested_from = %requested_from,
            "Registration link email (development mode)"
        );

        Self::print_box(
            "REGISTRATION LINK EMAIL",
            to,
            "Complete your registration",
            &[
                String::new(),
                format!("Hi {name},"),
                "Click the link below to finish creating your account.".to_string(),
                format!("This link expires at {}.", expires_at.format("%H:%M UTC")),
                String::new(),
                link.to_string(),
                String::new(),
                format!("Requested from {requested_from}."),
            ],
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_console_provider_always_succeeds() {
        let provider = ConsoleEmailProvider::new();
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let sent = provider
            .send_magic_link("a@x.com", "http://localhost/verify/t", Utc::now(), ip)
            .await;
        assert!(sent.is_ok());

        let sent = provider
            .send_registration_link("a@x.com", "Ada", "http://localhost/verify/t", Utc::now(), ip)
            .await;
        assert!(sent.is_ok());
    }
}
