//! Flow metrics.
//!
//! Counters are emitted through the `metrics` facade and are no-ops until the
//! application installs a recorder (for example a Prometheus exporter).
//! Every counter carries a `flow` label (`login`, `registration`,
//! `impersonation`).

use metrics::describe_counter;

/// Link requests that issued a token.
pub const LINK_REQUESTED: &str = "auth.link.requested";

/// Issued links whose notification could not be delivered.
pub const LINK_DELIVERY_FAILED: &str = "auth.link.delivery_failed";

/// Links redeemed successfully.
pub const LINK_VERIFIED: &str = "auth.link.verified";

/// Link redemptions rejected as invalid or expired.
pub const LINK_REJECTED: &str = "auth.link.rejected";

/// Requests denied by the rate limiter.
pub const RATE_LIMIT_DENIED: &str = "auth.rate_limit.denied";

/// Impersonation sessions started.
pub const IMPERSONATION_STARTED: &str = "auth.impersonation.started";

/// Impersonation hand-offs rejected.
pub const IMPERSONATION_REJECTED: &str = "auth.impersonation.rejected";

/// Register metric descriptions with the installed recorder.
///
/// Call once after installing the recorder.
pub fn register_metrics() {
    describe_counter!(LINK_REQUESTED, "Total number of login and registration links issued");
    describe_counter!(
        LINK_DELIVERY_FAILED,
        "Total number of issued links whose email could not be delivered"
    );
    describe_counter!(LINK_VERIFIED, "Total number of links redeemed successfully");
    describe_counter!(
        LINK_REJECTED,
        "Total number of link redemptions rejected as invalid or expired"
    );
    describe_counter!(
        RATE_LIMIT_DENIED,
        "Total number of requests denied by the rate limiter"
    );
    describe_counter!(
        IMPERSONATION_STARTED,
        "Total number of impersonation sessions started"
    );
    describe_counter!(
        IMPERSONATION_REJECTED,
        "Total number of impersonation hand-offs rejected"
    );
}

/// Increment `name` by one for `flow`.
pub(crate) fn increment(name: &'static str, flow: &'static str) {
    metrics::counter!(name, "flow" => flow).increment(1);
}
