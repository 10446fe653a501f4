//! Per-key dispatch pacing.
//!
//! [`DispatchThrottle`] remembers, for each throttle key, the instant at which
//! the next dispatch may start. The gap itself comes from the stateless
//! [`RateLimitPolicy`]. Keys are either one shared global key or the channel
//! instance name, depending on [`RateLimitScope`].

use std::collections::HashMap;
use std::time::Duration;

use agenda_core::rate_limit::RateLimitPolicy;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RateLimitScope;

/// Key shared by every channel under [`RateLimitScope::Global`].
const GLOBAL_KEY: &str = "*";

pub struct DispatchThrottle {
    policy: RateLimitPolicy,
    scope: RateLimitScope,
    next_allowed: HashMap<String, Instant>,
    rng: StdRng,
}

impl DispatchThrottle {
    pub fn new(policy: RateLimitPolicy, scope: RateLimitScope) -> Self {
        Self::with_rng(policy, scope, StdRng::from_os_rng())
    }

    /// Use a caller-provided generator, e.g. a seeded one in tests.
    pub fn with_rng(policy: RateLimitPolicy, scope: RateLimitScope, rng: StdRng) -> Self {
        Self {
            policy,
            scope,
            next_allowed: HashMap::new(),
            rng,
        }
    }

    fn key<'a>(&self, instance: &'a str) -> &'a str {
        match self.scope {
            RateLimitScope::Global => GLOBAL_KEY,
            RateLimitScope::Channel => instance,
        }
    }

    /// Remaining wait before `instance` may dispatch.
    pub fn wait_time(&self, instance: &str) -> Duration {
        let next = self
            .next_allowed
            .get(self.key(instance))
            .map(|at| at.into_std());
        RateLimitPolicy::wait_for(next, Instant::now().into_std())
    }

    /// Sleep until `instance` may dispatch.
    ///
    /// Returns `false` if `cancel` fired first; the caller must not dispatch.
    pub async fn wait(&self, instance: &str, cancel: &CancellationToken) -> bool {
        let delay = self.wait_time(instance);
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }

        tracing::debug!(
            instance,
            wait_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Waiting for dispatch slot"
        );

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Push the key's next slot out by a fresh gap, measured from now. Called
    /// after every dispatch attempt, whatever its outcome.
    pub fn rearm(&mut self, instance: &str) {
        let now = Instant::now();
        let next = self.policy.next_allowed(now.into_std(), &mut self.rng);
        let key = self.key(instance).to_string();
        self.next_allowed.insert(key, Instant::from_std(next));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
