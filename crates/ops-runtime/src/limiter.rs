//! The outbound rate limiter.
//!
//! A sliding one-second window of request instants caps throughput at ten,
//! and a 100 ms minimum spacing holds between any two requests even when
//! the window has room. The decision function is pure over a supplied
//! `Instant` so the schedule is testable without sleeping; the dispatcher
//! owns the only instance and sleeps whatever delay it is told.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    window: VecDeque<Instant>,
    last: Option<Instant>,
    max_per_window: usize,
    window_len: Duration,
    min_spacing: Duration,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window_len: Duration, min_spacing: Duration) -> Self {
        Self {
            window: VecDeque::with_capacity(max_per_window + 1),
            last: None,
            max_per_window,
            window_len,
            min_spacing,
        }
    }

    /// Limiter with the contract defaults: 10 requests / 1 s, 100 ms spacing.
    pub fn standard() -> Self {
        Self::new(10, Duration::from_secs(1), Duration::from_millis(100))
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.window.front() {
            if now.duration_since(*oldest) >= self.window_len {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long a request starting at `now` must wait.
    ///
    /// When the window is full, the wait runs until the oldest timestamp
    /// leaves the window plus the 100 ms buffer; below the cap the minimum
    /// spacing still applies.
    pub fn required_delay(&mut self, now: Instant) -> Duration {
        self.prune(now);

        let spacing_wait = match self.last {
            Some(last) => (last + self.min_spacing).saturating_duration_since(now),
            None => Duration::ZERO,
        };

        let cap_wait = if self.window.len() >= self.max_per_window {
            let oldest = *self.window.front().expect("window non-empty at cap");
            (oldest + self.window_len + self.min_spacing).saturating_duration_since(now)
        } else {
            Duration::ZERO
        };

        spacing_wait.max(cap_wait)
    }

    /// Record a request that was actually initiated at `at`.
    pub fn record(&mut self, at: Instant) {
        self.prune(at);
        self.window.push_back(at);
        self.last = Some(at);
    }

    #[cfg(test)]
    fn in_window(&self) -> usize {
        self.window.len()
    }
}
