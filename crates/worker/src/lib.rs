//! Process wiring for the notification worker: configuration and tracing.

pub mod config;

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::LogFormat;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "agenda_worker=debug,agenda_notifications=debug";

/// Install the global tracing subscriber.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Wait up to `timeout` for a service task to finish, aborting it otherwise.
///
/// Returns `true` if the task stopped on its own.
pub async fn join_or_abort<T>(mut handle: JoinHandle<T>, timeout: Duration, service: &str) -> bool {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(_)) => {
            tracing::info!(service, "Service stopped");
            true
        }
        Ok(Err(e)) => {
            tracing::error!(service, error = %e, "Service task ended abnormally");
            true
        }
        Err(_) => {
            tracing::warn!(service, "Service did not stop in time, aborting");
            handle.abort();
            false
        }
    }
}
