//! Mock email provider for testing.

use crate::error::{AuthError, Result};
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

/// Which notification was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentKind {
    /// Login link.
    MagicLink,
    /// Registration link.
    Registration,
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Notification kind.
    pub kind: SentKind,
    /// Recipient.
    pub to: String,
    /// Display name (registration only).
    pub name: Option<String>,
    /// Verification link.
    pub link: String,
    /// Link expiry.
    pub expires_at: DateTime<Utc>,
    /// IP address of the request.
    pub requested_from: IpAddr,
}

impl SentEmail {
    /// Token embedded in the link.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        let segment = self.link.rsplit('/').next()?;
        urlencoding::decode(segment).ok().map(|t| t.into_owned())
    }
}

#[derive(Debug, Default)]
struct Outbox {
    sent: Vec<SentEmail>,
    failed: Vec<SentEmail>,
    fail_next: bool,
    fail_all: bool,
}

/// Mock email provider.
///
/// Records every notification instead of sending it, and can be told to
/// fail to simulate a transport outage. Failed sends are kept separately in
/// [`failed`](Self::failed).
#[derive(Debug, Clone, Default)]
pub struct MockEmailProvider {
    outbox: Arc<Mutex<Outbox>>,
}

impl MockEmailProvider {
    /// Create a new mock email provider that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next send fail.
    pub fn fail_next_send(&self) {
        self.outbox().fail_next = true;
    }

    /// Make every send fail until called again with `false`.
    pub fn fail_all_sends(&self, fail: bool) {
        self.outbox().fail_all = fail;
    }

    /// Notifications delivered so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox().sent.clone()
    }

    /// Notifications whose delivery failed, oldest first.
    #[must_use]
    pub fn failed(&self) -> Vec<SentEmail> {
        self.outbox().failed.clone()
    }

    /// Token embedded in the most recently delivered link.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.outbox().sent.last()?.token()
    }

    fn outbox(&self) -> std::sync::MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, email: SentEmail) -> Result<()> {
        let mut outbox = self.outbox();
        if outbox.fail_all || std::mem::take(&mut outbox.fail_next) {
            outbox.failed.push(email);
            return Err(AuthError::EmailError("SMTP connection refused".to_string()));
        }
        outbox.sent.push(email);
        Ok(())
    }
}

impl EmailProvider for MockEmailProvider {
    fn send_magic_link(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> impl Future<Output = Result<()>> + Send {
        let result = self.record(SentEmail {
            kind: SentKind::MagicLink,
            to: to.to_string(),
            name: None,
            link: link.to_string(),
            expires_at,
            requested_from,
        });

        async move { result }
    }

    fn send_registration_link(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> impl Future<Output = Result<()>> + Send {
        let result = self.record(SentEmail {
            kind: SentKind::Registration,
            to: to.to_string(),
            name: Some(name.to_string()),
            link: link.to_string(),
            expires_at,
            requested_from,
        });

        async move { result }
    }
}
