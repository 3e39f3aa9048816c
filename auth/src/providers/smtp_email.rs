//! SMTP email provider implementation using Lettre.

use crate::error::{AuthError, Result};
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::net::IpAddr;

/// SMTP email provider using Lettre.
///
/// This provider sends real emails via SMTP over TLS, suitable for production
/// use. The transport is async and pooled, so it is built once.
///
/// # Examples
///
/// ```ignore
/// use passlink_auth::providers::SmtpEmailProvider;
///
/// let provider = SmtpEmailProvider::new(
///     "smtp.example.com",
///     587,
///     "user".to_string(),
///     "app_password".to_string(),
///     "noreply@example.com".to_string(),
///     "Example App".to_string(),
/// )?;
/// ```
#[derive(Clone)]
pub struct SmtpEmailProvider {
    /// Pooled SMTP transport.
    transport: AsyncSmtpTransport<Tokio1Executor>,

    /// Sender email address.
    from_email: String,

    /// Sender display name.
    from_name: String,
}

impl SmtpEmailProvider {
    /// Create a new SMTP email provider.
    ///
    /// # Arguments
    ///
    /// - `smtp_server`: SMTP server address
    /// - `smtp_port`: SMTP server port (usually 587)
    /// - `smtp_username`: SMTP authentication username
    /// - `smtp_password`: SMTP authentication password
    /// - `from_email`: Sender email address
    /// - `from_name`: Sender display name
    ///
    /// # Errors
    ///
    /// Returns error if the relay configuration is invalid.
    pub fn new(
        smtp_server: &str,
        smtp_port: u16,
        smtp_username: String,
        smtp_password: String,
        from_email: String,
        from_name: String,
    ) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_server)
            .map_err(|e| AuthError::EmailError(format!("SMTP relay error: {e}")))?
            .port(smtp_port)
            .credentials(Credentials::new(smtp_username, smtp_password))
            .build();

        Ok(Self {
            transport,
            from_email,
            from_name,
        })
    }

    /// Build the "From" header.
    fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    async fn send_html(&self, to: &str, subject: &str, html_body: String) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from_header()
                    .parse()
                    .map_err(|e| AuthError::EmailError(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| AuthError::EmailError(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)
            .map_err(|e| AuthError::EmailError(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AuthError::EmailError(format!("Failed to send email: {e}")))?;

        tracing::debug!(to = %to, subject = %subject, "Email handed to SMTP relay");

        Ok(())
    }
}

fn render(
    heading: &str,
    intro: &str,
    button: &str,
    link: &str,
    expires_at: DateTime<Utc>,
    requested_from: IpAddr,
) -> String {
    let expires = expires_at.format("%H:%M UTC");
    format!(
        r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{heading}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #2563eb;">{heading}</h2>
        <p>{intro} This link expires at {expires}.</p>
        <p style="margin: 30px 0;">
            <a href="{link}"
               style="display: inline-block; background-color: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">
                {button}
            </a>
        </p>
        <p style="color: #666; font-size: 14px;">
            This link was requested from {requested_from}. If you didn't request it, you can safely ignore this email.
        </p>
        <p style="color: #666; font-size: 12px; margin-top: 40px;">
            Or copy and paste this link into your browser:<br>
            {link}
        </p>
    </div>
</body>
</html>
            "#
    )
}

impl EmailProvider for SmtpEmailProvider {
    async fn send_magic_link(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> Result<()> {
        let html_body = render(
            "Your login link",
            "Click the button below to log in to your account.",
            "Log In",
            link,
            expires_at,
            requested_from,
        );

        self.send_html(to, "Your login link", html_body).await
    }

    async fn send_registration_link(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expires_at: DateTime<Utc>,
        requested_from: IpAddr,
    ) -> Result<()> {
        let intro = format!(
            "Hi {}, click the button below to finish creating your account.",
            html_escape(name)
        );
        let html_body = render(
            "Complete your registration",
            &intro,
            "Create Account",
            link,
            expires_at,
            requested_from,
        );

        self.send_html(to, "Complete your registration", html_body)
            .await
    }
}

/// Escape user-supplied text for inclusion in the HTML body.
fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
