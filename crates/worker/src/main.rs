use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use agenda_notifications::recorder::DEFAULT_QUEUE_CAPACITY;
use agenda_notifications::{
    EmailConfig, EmailDelivery, GatewayConfig, NotificationScheduler, OutcomeRecorder,
    OutcomeRecorderService, SchedulerConfig, TextGatewayClient,
};
use agenda_worker::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    agenda_worker::init_tracing(config.log_format);

    let scheduler_config = SchedulerConfig::from_env();
    tracing::info!(
        run_interval_ms = u64::try_from(scheduler_config.run_interval.as_millis()).unwrap_or(u64::MAX),
        batch_size = scheduler_config.batch_size,
        max_attempts = scheduler_config.retry_policy.max_attempts,
        scope = ?scheduler_config.rate_limit_scope,
        "Loaded scheduler configuration"
    );

    let gateway_config = GatewayConfig::from_env()
        .context("MESSAGING_GATEWAY_URL must be set")?
        .bounded_by(scheduler_config.rate_limit.fixed_delay);
    let gateway = TextGatewayClient::new(gateway_config)
        .context("Failed to build messaging gateway client")?;

    // --- Database ---
    let pool = agenda_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    agenda_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    agenda_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Outcome recorder ---
    let (recorder, receiver) = OutcomeRecorder::channel(DEFAULT_QUEUE_CAPACITY);
    let recorder_handle = tokio::spawn(OutcomeRecorderService::run(pool.clone(), receiver));

    // --- Scheduler ---
    let mut scheduler =
        NotificationScheduler::new(pool.clone(), scheduler_config, Arc::new(gateway), recorder);
    match EmailConfig::from_env() {
        Some(email) => {
            scheduler = scheduler.with_mailer(Arc::new(EmailDelivery::new(email)));
        }
        None => tracing::info!("SMTP_HOST not set, disconnection alerts will only be logged"),
    }

    let cancel = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));
    tracing::info!("Notification worker started");

    shutdown_signal().await;

    // --- Shutdown ---
    // The scheduler owns the last recorder handle; once it stops, the
    // recorder drains its queue and exits.
    cancel.cancel();
    agenda_worker::join_or_abort(scheduler_handle, config.shutdown_timeout, "notification scheduler")
        .await;
    agenda_worker::join_or_abort(recorder_handle, config.shutdown_timeout, "outcome recorder").await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
