//! ops-runtime
//!
//! The engine's moving parts: the single-threaded dispatcher, its rate
//! limiter and retry schedule, the dry-run simulator, and the supervisor
//! that owns lifecycle, pause/resume, health and shutdown.

mod backoff;
mod dispatch;
mod dryrun;
mod limiter;
mod supervisor;

pub use backoff::retry_delay_ms;
pub use dispatch::{
    extraction_failure_transition, failure_transition, Dispatcher, Transition, DISABLED_MESSAGE,
    DISPATCHER_ID,
};
pub use dryrun::{dry_run, DryRunResult};
pub use limiter::RateLimiter;
pub use supervisor::{HealthReport, HealthState, Supervisor, SyncEngine};
