//! Scheduler tunables loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use agenda_core::notification::DeliveryRetryPolicy;
use agenda_core::rate_limit::{RateLimitPolicy, DEFAULT_FIXED_DELAY, DEFAULT_JITTER_MAX};

/// Default period between scheduler runs (5 minutes).
pub const DEFAULT_RUN_INTERVAL: Duration = Duration::from_millis(300_000);

/// Default number of candidates per processing chunk.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default length of the evaluation window, in minutes.
pub const DEFAULT_CATCH_UP_MINUTES: i64 = 60;

// ---------------------------------------------------------------------------
// RateLimitScope
// ---------------------------------------------------------------------------

/// Which dispatches share a throttle key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitScope {
    /// Every dispatch in the process shares one key.
    #[default]
    Global,
    /// Each messaging channel instance is paced independently.
    Channel,
}

impl FromStr for RateLimitScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "channel" => Ok(Self::Channel),
            other => Err(format!("unknown rate limit scope '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

/// Settings for [`NotificationScheduler`](crate::scheduler::NotificationScheduler).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub run_interval: Duration,
    pub batch_size: usize,
    pub rate_limit: RateLimitPolicy,
    pub rate_limit_scope: RateLimitScope,
    /// Length of the evaluation window ending at each run's `now`. Never
    /// shorter than `run_interval`, otherwise due instants between two
    /// windows would be skipped.
    pub catch_up: chrono::Duration,
    pub retry_policy: DeliveryRetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_interval: DEFAULT_RUN_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit: RateLimitPolicy::default(),
            rate_limit_scope: RateLimitScope::Global,
            catch_up: chrono::Duration::minutes(DEFAULT_CATCH_UP_MINUTES),
            retry_policy: DeliveryRetryPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparseable values fall back to their defaults.
    ///
    /// | Variable                          | Default  |
    /// |-----------------------------------|----------|
    /// | `NOTIFICATION_RUN_INTERVAL_MS`    | `300000` |
    /// | `NOTIFICATION_BATCH_SIZE`         | `50`     |
    /// | `NOTIFICATION_FIXED_DELAY_MS`     | `180000` |
    /// | `NOTIFICATION_JITTER_MAX_MS`      | `60000`  |
    /// | `NOTIFICATION_CATCH_UP_MINUTES`   | `60`     |
    /// | `NOTIFICATION_MAX_ATTEMPTS`       | `1`      |
    /// | `NOTIFICATION_RATE_LIMIT_SCOPE`   | `global` |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        let run_interval = parsed("NOTIFICATION_RUN_INTERVAL_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RUN_INTERVAL);

        let batch_size = parsed("NOTIFICATION_BATCH_SIZE")
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX).max(1))
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let rate_limit = RateLimitPolicy::new(
            parsed("NOTIFICATION_FIXED_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_FIXED_DELAY),
            parsed("NOTIFICATION_JITTER_MAX_MS")
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_JITTER_MAX),
        );

        let rate_limit_scope = match lookup("NOTIFICATION_RATE_LIMIT_SCOPE") {
            Some(raw) => raw.parse::<RateLimitScope>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to global rate limit scope");
                RateLimitScope::Global
            }),
            None => RateLimitScope::Global,
        };

        let catch_up_minutes = parsed("NOTIFICATION_CATCH_UP_MINUTES")
            .and_then(|m| i64::try_from(m).ok())
            .unwrap_or(DEFAULT_CATCH_UP_MINUTES);

        let retry_policy = parsed("NOTIFICATION_MAX_ATTEMPTS")
            .map(|n| DeliveryRetryPolicy::new(u32::try_from(n).unwrap_or(u32::MAX)))
            .unwrap_or_default();

        Self {
            run_interval,
            batch_size,
            rate_limit,
            rate_limit_scope,
            catch_up: Self::widen_to_interval(
                chrono::Duration::minutes(catch_up_minutes),
                run_interval,
            ),
            retry_policy,
        }
    }

    fn widen_to_interval(catch_up: chrono::Duration, run_interval: Duration) -> chrono::Duration {
        let interval = chrono::Duration::from_std(run_interval).unwrap_or(chrono::Duration::MAX);
        catch_up.max(interval)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> SchedulerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SchedulerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = config_from(&[]);
        assert_eq!(config.run_interval, Duration::from_secs(300));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.rate_limit.fixed_delay, Duration::from_secs(180));
        assert_eq!(config.rate_limit.jitter_max, Duration::from_secs(60));
        assert_eq!(config.catch_up, chrono::Duration::minutes(60));
        assert_eq!(config.retry_policy, DeliveryRetryPolicy::NEVER_RETRY);
        assert_eq!(config.rate_limit_scope, RateLimitScope::Global);
    }

    #[test]
    fn explicit_values_are_used() {
        let config = config_from(&[
            ("NOTIFICATION_RUN_INTERVAL_MS", "60000"),
            ("NOTIFICATION_BATCH_SIZE", "10"),
            ("NOTIFICATION_FIXED_DELAY_MS", "1000"),
            ("NOTIFICATION_JITTER_MAX_MS", "0"),
            ("NOTIFICATION_CATCH_UP_MINUTES", "15"),
            ("NOTIFICATION_MAX_ATTEMPTS", "3"),
            ("NOTIFICATION_RATE_LIMIT_SCOPE", "Channel"),
        ]);
        assert_eq!(config.run_interval, Duration::from_secs(60));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.rate_limit.fixed_delay, Duration::from_secs(1));
        assert_eq!(config.rate_limit.jitter_max, Duration::ZERO);
        assert_eq!(config.catch_up, chrono::Duration::minutes(15));
        assert_eq!(config.retry_policy.max_attempts, 3);
        assert_eq!(config.rate_limit_scope, RateLimitScope::Channel);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config_from(&[
            ("NOTIFICATION_BATCH_SIZE", "lots"),
            ("NOTIFICATION_RUN_INTERVAL_MS", "-5"),
            ("NOTIFICATION_RATE_LIMIT_SCOPE", "tenant"),
        ]);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.run_interval, DEFAULT_RUN_INTERVAL);
        assert_eq!(config.rate_limit_scope, RateLimitScope::Global);
    }

    #[test]
    fn batch_size_and_attempts_have_a_floor_of_one() {
        let config = config_from(&[
            ("NOTIFICATION_BATCH_SIZE", "0"),
            ("NOTIFICATION_MAX_ATTEMPTS", "0"),
        ]);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.retry_policy.max_attempts, 1);
    }

    #[test]
    fn catch_up_never_shorter_than_interval() {
        let config = config_from(&[
            ("NOTIFICATION_RUN_INTERVAL_MS", "1800000"),
            ("NOTIFICATION_CATCH_UP_MINUTES", "5"),
        ]);
        assert_eq!(config.catch_up, chrono::Duration::minutes(30));
    }
}
