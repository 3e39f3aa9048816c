//! Input validation and link helpers.

use crate::constants::{MAX_EMAIL_LENGTH, MAX_NAME_LENGTH, MIN_NAME_LENGTH};
use crate::error::RequestLinkError;

/// Normalize an email address for lookups and rate-limit keys.
///
/// # Examples
///
/// ```
/// use passlink_auth::utils::normalize_email;
///
/// assert_eq!(normalize_email("  Chef@Example.COM "), "chef@example.com");
/// ```
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate email address format.
///
/// This performs basic RFC 5322 validation:
/// - Must contain exactly one `@`
/// - Must have non-empty local and domain parts
/// - Length must be between 3 and 255 characters
///
/// # Examples
///
/// ```
/// use passlink_auth::utils::is_valid_email;
///
/// assert!(is_valid_email("user@example.com"));
/// assert!(is_valid_email("user+tag@subdomain.example.com"));
/// assert!(!is_valid_email("invalid"));
/// assert!(!is_valid_email("@example.com"));
/// assert!(!is_valid_email("user@"));
/// ```
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > MAX_EMAIL_LENGTH {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    // Domain must contain at least one dot
    if !domain.contains('.') {
        return false;
    }

    let valid_local_chars =
        |c: char| c.is_alphanumeric() || c == '.' || c == '-' || c == '+' || c == '_';

    let valid_domain_chars = |c: char| c.is_alphanumeric() || c == '.' || c == '-';

    if !local.chars().all(valid_local_chars) || !domain.chars().all(valid_domain_chars) {
        return false;
    }

    // Domain parts between dots must be non-empty
    domain.split('.').all(|part| !part.is_empty())
}

/// Validate and normalize an email submitted to a link request.
///
/// # Errors
///
/// Returns `RequestLinkError::ValidationFailed` when the address is missing,
/// malformed, or too long.
pub fn validate_email(email: &str) -> Result<String, RequestLinkError> {
    let email = normalize_email(email);

    if email.is_empty() {
        return Err(RequestLinkError::validation(
            "email",
            "Email address is required.",
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(RequestLinkError::validation(
            "email",
            "Email address may not be greater than 255 characters.",
        ));
    }

    if !is_valid_email(&email) {
        return Err(RequestLinkError::validation(
            "email",
            "Please enter a valid email address.",
        ));
    }

    Ok(email)
}

/// Validate a display name submitted to a registration request.
///
/// # Errors
///
/// Returns `RequestLinkError::ValidationFailed` when the name is missing,
/// shorter than 2 characters, or longer than 255 characters.
pub fn validate_name(name: &str) -> Result<String, RequestLinkError> {
    let name = name.trim();
    let length = name.chars().count();

    if length == 0 {
        return Err(RequestLinkError::validation("name", "Name is required."));
    }

    if length < MIN_NAME_LENGTH {
        return Err(RequestLinkError::validation(
            "name",
            "Name must be at least 2 characters.",
        ));
    }

    if length > MAX_NAME_LENGTH {
        return Err(RequestLinkError::validation(
            "name",
            "Name may not be greater than 255 characters.",
        ));
    }

    Ok(name.to_string())
}

/// Build a verification link by appending the token as a path segment.
///
/// # Examples
///
/// ```
/// use passlink_auth::utils::build_link;
///
/// assert_eq!(
///     build_link("https://app.example.com/passwordless/verify/", "abc_123"),
///     "https://app.example.com/passwordless/verify/abc_123"
/// );
/// ```
#[must_use]
pub fn build_link(base_url: &str, token: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}
