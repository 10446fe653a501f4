//! Periodic notification scheduler.
//!
//! [`NotificationScheduler`] runs as a background task. Every tick it takes
//! the cross-process [`RunLock`], evaluates the window ending now, and drives
//! confirmations then reminders through
//! dedup, validation, composition, throttled dispatch and outcome recording.
//! Each candidate is processed sequentially because of the mandatory gap
//! between dispatches.

use std::sync::Arc;

use agenda_core::notification::{
    validate_hours_before, DedupKey, EvaluationWindow, NotificationType,
};
use agenda_core::phone;
use agenda_core::template::MessageComposer;
use agenda_core::types::Timestamp;
use agenda_db::models::candidate::NotificationCandidate;
use agenda_db::repositories::CandidateRepo;
use agenda_db::DbPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::alerter::DisconnectionAlerter;
use crate::config::SchedulerConfig;
use crate::dedup::DedupGate;
use crate::delivery::email::AlertMailer;
use crate::delivery::gateway::MessageGateway;
use crate::recorder::{OutcomeRecorder, RecordError, StatusTransition};
use crate::run_lock::{RunLock, SCHEDULER_LOCK_KEY};
use crate::throttle::DispatchThrottle;

// ---------------------------------------------------------------------------
// Errors and summaries
// ---------------------------------------------------------------------------

/// Failure that aborts a phase or a single candidate.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Recording failed: {0}")]
    Record(#[from] RecordError),
}

/// Counters for one notification type within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    pub found: usize,
    pub skipped_duplicate: usize,
    pub sent: usize,
    pub failed: usize,
    /// Candidates abandoned because of an unexpected error.
    pub errored: usize,
    /// Candidates held back because their channel is disconnected.
    pub disconnected: usize,
}

/// Counters for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub confirmations: PhaseSummary,
    pub reminders: PhaseSummary,
    pub organizations_alerted: usize,
    pub alerts_emailed: usize,
    /// Cancellation stopped the run before every candidate was processed.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn phase(&self, kind: NotificationType) -> &PhaseSummary {
        match kind {
            NotificationType::Confirmation => &self.confirmations,
            NotificationType::Reminder => &self.reminders,
        }
    }

    fn phase_mut(&mut self, kind: NotificationType) -> &mut PhaseSummary {
        match kind {
            NotificationType::Confirmation => &mut self.confirmations,
            NotificationType::Reminder => &mut self.reminders,
        }
    }
}

/// Terminal state of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateOutcome {
    Duplicate,
    Disconnected,
    Sent,
    Failed,
    Interrupted,
}

// ---------------------------------------------------------------------------
// NotificationScheduler
// ---------------------------------------------------------------------------

/// Background service that delivers due appointment notifications.
pub struct NotificationScheduler {
    pool: DbPool,
    config: SchedulerConfig,
    gateway: Arc<dyn MessageGateway>,
    recorder: OutcomeRecorder,
    dedup: DedupGate,
    throttle: DispatchThrottle,
    composer: MessageComposer,
    alerter: DisconnectionAlerter,
    lock_key: i64,
}

impl NotificationScheduler {
    pub fn new(
        pool: DbPool,
        config: SchedulerConfig,
        gateway: Arc<dyn MessageGateway>,
        recorder: OutcomeRecorder,
    ) -> Self {
        Self {
            dedup: DedupGate::new(pool.clone(), config.retry_policy),
            throttle: DispatchThrottle::new(config.rate_limit, config.rate_limit_scope),
            composer: MessageComposer::default(),
            alerter: DisconnectionAlerter::new(None),
            lock_key: SCHEDULER_LOCK_KEY,
            pool,
            config,
            gateway,
            recorder,
        }
    }

    /// E-mail disconnection alerts through `mailer`.
    pub fn with_mailer(mut self, mailer: Arc<dyn AlertMailer>) -> Self {
        self.alerter = DisconnectionAlerter::new(Some(mailer));
        self
    }

    pub fn with_throttle(mut self, throttle: DispatchThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_composer(mut self, composer: MessageComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_lock_key(mut self, key: i64) -> Self {
        self.lock_key = key;
        self
    }

    /// Run the scheduler loop.
    ///
    /// Ticks every `run_interval`; a run that outlasts the interval delays
    /// the next tick rather than stacking runs. The loop exits when `cancel`
    /// fires. A run in progress stops before its next dispatch.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.run_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_ms = u64::try_from(self.config.run_interval.as_millis()).unwrap_or(u64::MAX),
            batch_size = self.config.batch_size,
            "Notification scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_guarded(chrono::Utc::now(), &cancel).await {
                        tracing::error!(error = %e, "Notification run failed");
                    }
                }
            }
        }
    }

    /// Run once under the cross-process lock.
    ///
    /// Returns `None` when another process holds the lock and the run was
    /// skipped.
    pub async fn run_guarded(
        &mut self,
        now: Timestamp,
        cancel: &CancellationToken,
    ) -> Result<Option<RunSummary>, sqlx::Error> {
        let Some(lock) = RunLock::try_acquire(&self.pool, self.lock_key).await? else {
            tracing::info!("Another notification run is in progress, skipping this tick");
            return Ok(None);
        };

        let summary = self.run_once(now, cancel).await;

        if let Err(e) = lock.release().await {
            tracing::warn!(error = %e, "Failed to release scheduler lock");
        }
        Ok(Some(summary))
    }

    /// Process every candidate due in the window ending at `now`.
    ///
    /// A failing phase is logged and does not prevent the other one.
    pub async fn run_once(&mut self, now: Timestamp, cancel: &CancellationToken) -> RunSummary {
        let span = tracing::info_span!("notification_run", now = %now);
        self.run_phases(now, cancel).instrument(span).await
    }

    async fn run_phases(&mut self, now: Timestamp, cancel: &CancellationToken) -> RunSummary {
        let window = EvaluationWindow::ending_at(now, self.config.catch_up);
        let mut summary = RunSummary::default();
        let mut disconnected = Vec::new();

        for kind in NotificationType::ALL {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let phase = summary.phase_mut(kind);
            let result = self
                .run_phase(kind, &window, cancel, phase, &mut disconnected)
                .await;
            match result {
                Ok(true) => {}
                Ok(false) => {
                    summary.interrupted = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(phase = %kind, error = %e, "Notification phase failed");
                }
            }
        }

        let groups = DisconnectionAlerter::group(&disconnected);
        summary.organizations_alerted = groups.len();
        summary.alerts_emailed = self.alerter.alert(&groups).await;

        tracing::info!(
            confirmations_found = summary.confirmations.found,
            confirmations_sent = summary.confirmations.sent,
            confirmations_failed = summary.confirmations.failed,
            reminders_found = summary.reminders.found,
            reminders_sent = summary.reminders.sent,
            reminders_failed = summary.reminders.failed,
            skipped_duplicate =
                summary.confirmations.skipped_duplicate + summary.reminders.skipped_duplicate,
            organizations_alerted = summary.organizations_alerted,
            interrupted = summary.interrupted,
            "Notification run finished"
        );

        summary
    }

    /// Process one notification type. Returns `Ok(false)` if cancelled.
    async fn run_phase(
        &mut self,
        kind: NotificationType,
        window: &EvaluationWindow,
        cancel: &CancellationToken,
        summary: &mut PhaseSummary,
        disconnected: &mut Vec<NotificationCandidate>,
    ) -> Result<bool, SchedulerError> {
        let candidates = CandidateRepo::find_due(&self.pool, kind, window).await?;
        summary.found = candidates.len();

        if candidates.is_empty() {
            return Ok(true);
        }
        tracing::debug!(phase = %kind, count = candidates.len(), "Found due candidates");

        for (batch_index, batch) in candidates.chunks(self.config.batch_size.max(1)).enumerate() {
            tracing::debug!(phase = %kind, batch = batch_index, size = batch.len(), "Processing batch");

            for candidate in batch {
                let outcome = self.process_candidate(kind, candidate, cancel).await;
                match outcome {
                    Ok(CandidateOutcome::Duplicate) => summary.skipped_duplicate += 1,
                    Ok(CandidateOutcome::Disconnected) => {
                        summary.disconnected += 1;
                        disconnected.push(candidate.clone());
                    }
                    Ok(CandidateOutcome::Sent) => summary.sent += 1,
                    Ok(CandidateOutcome::Failed) => summary.failed += 1,
                    Ok(CandidateOutcome::Interrupted) => return Ok(false),
                    Err(e) => {
                        summary.errored += 1;
                        tracing::error!(
                            appointment_id = candidate.appointment_id,
                            phase = %kind,
                            hours_before = candidate.hours_before,
                            error = %e,
                            "Failed to process notification candidate"
                        );
                    }
                }
            }
        }

        Ok(true)
    }

    /// Drive one candidate to a terminal state.
    async fn process_candidate(
        &mut self,
        kind: NotificationType,
        candidate: &NotificationCandidate,
        cancel: &CancellationToken,
    ) -> Result<CandidateOutcome, SchedulerError> {
        if cancel.is_cancelled() {
            return Ok(CandidateOutcome::Interrupted);
        }

        let key = candidate.dedup_key(kind);
        if self.dedup.should_skip(&key).await? {
            tracing::debug!(key = %key, "Already attempted, skipping");
            return Ok(CandidateOutcome::Duplicate);
        }

        if !candidate.channel_connected {
            return Ok(CandidateOutcome::Disconnected);
        }

        if let Err(e) = validate_hours_before(kind, candidate.hours_before) {
            tracing::warn!(key = %key, error = %e, "Rule horizon is not allowed");
            let raw_phone = candidate.recipient_phone.as_deref();
            self.recorder
                .record_failure(candidate, kind, &e.to_string(), raw_phone)
                .await?;
            return Ok(CandidateOutcome::Failed);
        }

        let number = match phone::normalize(candidate.recipient_phone.as_deref()) {
            Ok(number) => number,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Recipient phone is unusable");
                let raw_phone = candidate.recipient_phone.as_deref();
                self.recorder
                    .record_failure(candidate, kind, &e.to_string(), raw_phone)
                    .await?;
                return Ok(CandidateOutcome::Failed);
            }
        };

        let text = self.composer.compose(
            kind,
            candidate.message_template.as_deref(),
            &candidate.template_context(),
        );

        let instance = candidate.channel_instance_name.as_str();
        if !self.throttle.wait(instance, cancel).await {
            return Ok(CandidateOutcome::Interrupted);
        }

        let result = self.gateway.send_text(instance, &number, &text).await;
        self.throttle.rearm(instance);

        match result {
            Ok(receipt) => {
                let outcome = self
                    .recorder
                    .record_success(candidate, kind, &number, &receipt)
                    .await?;
                self.log_transition(&key, &outcome.transition);
                tracing::info!(
                    key = %key,
                    instance,
                    message_id = receipt.message_id.as_deref().unwrap_or_default(),
                    "Notification sent"
                );
                Ok(CandidateOutcome::Sent)
            }
            Err(e) => {
                tracing::warn!(key = %key, instance, error = %e, "Notification dispatch failed");
                self.recorder
                    .record_failure(candidate, kind, &e.to_string(), Some(&number))
                    .await?;
                Ok(CandidateOutcome::Failed)
            }
        }
    }

    fn log_transition(&self, key: &DedupKey, transition: &StatusTransition) {
        match transition {
            StatusTransition::Applied => {
                tracing::debug!(key = %key, "Appointment awaiting confirmation");
            }
            StatusTransition::NotApplicable => {}
            StatusTransition::AlreadyAdvanced(status) => {
                tracing::info!(
                    key = %key,
                    status = %status,
                    "Appointment already left SCHEDULED, status unchanged"
                );
            }
            StatusTransition::AppointmentMissing => {
                tracing::error!(
                    key = %key,
                    reconcile = true,
                    "Appointment disappeared after its confirmation was sent"
                );
            }
        }
    }
}
