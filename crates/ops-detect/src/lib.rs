//! ops-detect
//!
//! Change detection for the sync engine. Three layers feed the queue:
//!
//! 1. Database triggers (primary) — live in the OPMS schema and insert
//!    queue rows directly; this crate only verifies they exist. Missing
//!    triggers degrade health but never stop operation.
//! 2. Polling (backup) — a watermark sweep over modification timestamps,
//!    bounded per tick, excluding items that already have an open job.
//! 3. Manual triggers — per-item and per-product, carrying operator
//!    identity and options.
//!
//! Enqueue-time filters live here too: the code-format rule (bypassable by
//! manual triggers), the digital-item block (never bypassable), and the
//! config gate (bypassable by manual override).

mod filters;
mod manual;
mod poll;
mod triggers;

pub use filters::{admit, code_matches_format, is_digital, EnqueueDecision, EnqueueRejection};
pub use manual::{trigger_item, trigger_product, ManualTriggerOutcome};
pub use poll::{poll_once, PollOutcome};
pub use triggers::{verify_triggers, TriggerHealth};

/// Minimal item identity the filters need.
#[derive(Debug, Clone)]
pub struct ItemRef {
    pub item_id: i64,
    pub product_id: i64,
    pub code: String,
    pub product_type: String,
}
