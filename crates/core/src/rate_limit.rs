//! Dispatch pacing policy.
//!
//! [`RateLimitPolicy`] holds no state. Callers keep the instant at which each
//! throttle key becomes free and ask the policy how long to wait and how far
//! to push that instant after a dispatch.

use std::time::{Duration, Instant};

use rand::Rng;

/// Default minimum gap between two dispatches (3 minutes).
pub const DEFAULT_FIXED_DELAY: Duration = Duration::from_secs(180);

/// Default upper bound of the random extra delay (60 seconds).
pub const DEFAULT_JITTER_MAX: Duration = Duration::from_secs(60);

/// Minimum delay plus uniform jitter between dispatches on one throttle key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub fixed_delay: Duration,
    pub jitter_max: Duration,
}

impl RateLimitPolicy {
    pub fn new(fixed_delay: Duration, jitter_max: Duration) -> Self {
        Self {
            fixed_delay,
            jitter_max,
        }
    }

    /// A policy that never waits. Used by tests and local tooling.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draw one gap: `fixed_delay + U[0, jitter_max]`.
    pub fn sample_gap<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter_ms = u64::try_from(self.jitter_max.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.random_range(0..=jitter_ms))
        };
        self.fixed_delay + jitter
    }

    /// When the key becomes free again after a dispatch at `dispatched_at`.
    pub fn next_allowed<R: Rng>(&self, dispatched_at: Instant, rng: &mut R) -> Instant {
        dispatched_at + self.sample_gap(rng)
    }

    /// How long to wait at `now` before dispatching on a key that becomes
    /// free at `next_allowed` (`None` = never used).
    pub fn wait_for(next_allowed: Option<Instant>, now: Instant) -> Duration {
        next_allowed
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FIXED_DELAY, DEFAULT_JITTER_MAX)
    }
}
