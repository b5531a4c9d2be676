//! ops-webhook
//!
//! The inbound leg: validate an ERP pricing webhook, honor the protected
//! guard flag, and apply the four pricing fields to the two OPMS tables
//! inside one transaction.

mod apply;
mod money;
mod validate;

pub use apply::apply;
pub use money::{cents_in_range, cents_to_price, coerce_cents, parse_price, price_to_cents, MAX_CENTS};
pub use validate::{validate_webhook, ValidatedPricing};

use std::sync::Mutex;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum WebhookError {
    /// Structurally invalid (missing identity, price out of range). No
    /// OPMS writes happen.
    Invalid(String),
    /// itemid did not resolve to an active OPMS item.
    UnknownItem(String),
    /// Transaction failure; everything rolled back.
    Db(anyhow::Error),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::Invalid(msg) => write!(f, "invalid webhook: {msg}"),
            WebhookError::UnknownItem(code) => {
                write!(f, "webhook item {code} not found or not active in OPMS")
            }
            WebhookError::Db(e) => write!(f, "webhook apply failed: {e}"),
        }
    }
}

impl std::error::Error for WebhookError {}

impl From<anyhow::Error> for WebhookError {
    fn from(e: anyhow::Error) -> Self {
        WebhookError::Db(e)
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Minimum spacing between distinct webhook applications (ERP callback
/// rate). The daemon consults this before invoking the applier.
pub struct WebhookThrottle {
    last: Mutex<Option<Instant>>,
    min_spacing: Duration,
}

impl WebhookThrottle {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            last: Mutex::new(None),
            min_spacing,
        }
    }

    /// How long the caller must wait before applying, measured at `now`.
    /// Recording happens separately once the apply actually starts.
    pub fn required_delay(&self, now: Instant) -> Duration {
        let last = self.last.lock().expect("throttle poisoned");
        match *last {
            Some(at) => {
                let next_ok = at + self.min_spacing;
                next_ok.saturating_duration_since(now)
            }
            None => Duration::ZERO,
        }
    }

    pub fn record(&self, at: Instant) {
        let mut last = self.last.lock().expect("throttle poisoned");
        *last = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_spaces_applications_one_second_apart() {
        let t = WebhookThrottle::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert_eq!(t.required_delay(t0), Duration::ZERO);
        t.record(t0);
        let wait = t.required_delay(t0 + Duration::from_millis(300));
        assert_eq!(wait, Duration::from_millis(700));
        assert_eq!(t.required_delay(t0 + Duration::from_secs(2)), Duration::ZERO);
    }
}
