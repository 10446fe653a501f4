//! Durable outcome recording.
//!
//! [`OutcomeRecorderService`] is a long-lived task that owns the database
//! pool and executes each delivery outcome in its own transaction. Callers
//! talk to it through the cloneable [`OutcomeRecorder`] handle. Because the
//! commit happens on the service task, a caller that is cancelled while
//! awaiting the reply never rolls an outcome back.

use agenda_core::notification::{AppointmentStatus, DeliveryStatus, NotificationType};
use agenda_core::types::DbId;
use agenda_db::models::candidate::NotificationCandidate;
use agenda_db::models::delivery_record::{CreateDeliveryRecord, DeliveryRecord};
use agenda_db::repositories::{AppointmentRepo, DeliveryRecordRepo};
use agenda_db::DbPool;
use sqlx::PgConnection;
use tokio::sync::{mpsc, oneshot};

use crate::delivery::gateway::DispatchReceipt;

/// Queue depth between the scheduler and the recorder service.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Error type for outcome recording.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The service task has stopped or dropped the request.
    #[error("Outcome recorder is not running")]
    RecorderClosed,
}

/// What happened to the appointment when a SENT record was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransition {
    /// `SCHEDULED -> AWAITING_CONFIRMATION` was applied.
    Applied,
    /// The notification type never changes the appointment.
    NotApplicable,
    /// The appointment was no longer `SCHEDULED`; it carries this status.
    AlreadyAdvanced(String),
    /// The appointment row no longer exists. The record is still committed.
    AppointmentMissing,
}

/// A committed outcome.
#[derive(Debug, Clone)]
pub struct RecordedOutcome {
    pub record: DeliveryRecord,
    pub transition: StatusTransition,
}

/// One unit of work for the service. Built by [`OutcomeRecorder`].
pub struct RecordCommand {
    record: CreateDeliveryRecord,
    advance_appointment: bool,
    reply: oneshot::Sender<Result<RecordedOutcome, sqlx::Error>>,
}

// ---------------------------------------------------------------------------
// OutcomeRecorder (handle)
// ---------------------------------------------------------------------------

/// Handle used by the scheduler to submit outcomes.
#[derive(Clone)]
pub struct OutcomeRecorder {
    sender: mpsc::Sender<RecordCommand>,
}

impl OutcomeRecorder {
    /// Create a handle and the receiver to pass to
    /// [`OutcomeRecorderService::run`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RecordCommand>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Append a SENT record and, for confirmations, advance the appointment
    /// to `AWAITING_CONFIRMATION` in the same transaction.
    pub async fn record_success(
        &self,
        candidate: &NotificationCandidate,
        kind: NotificationType,
        resolved_phone: &str,
        receipt: &DispatchReceipt,
    ) -> Result<RecordedOutcome, RecordError> {
        let record = CreateDeliveryRecord {
            appointment_id: candidate.appointment_id,
            notification_type: kind,
            hours_before: candidate.hours_before,
            status: DeliveryStatus::Sent,
            recipient_phone: Some(resolved_phone.to_string()),
            channel_instance_name: candidate.channel_instance_name.clone(),
            error_message: None,
            provider_remote_jid: receipt.remote_jid.clone(),
            provider_message_id: receipt.message_id.clone(),
        };
        self.submit(record, kind.transitions_appointment()).await
    }

    /// Append a FAILED record carrying `error`.
    pub async fn record_failure(
        &self,
        candidate: &NotificationCandidate,
        kind: NotificationType,
        error: &str,
        resolved_phone: Option<&str>,
    ) -> Result<DeliveryRecord, RecordError> {
        let record = CreateDeliveryRecord {
            appointment_id: candidate.appointment_id,
            notification_type: kind,
            hours_before: candidate.hours_before,
            status: DeliveryStatus::Failed,
            recipient_phone: resolved_phone.map(str::to_string),
            channel_instance_name: candidate.channel_instance_name.clone(),
            error_message: Some(error.to_string()),
            provider_remote_jid: None,
            provider_message_id: None,
        };
        Ok(self.submit(record, false).await?.record)
    }

    async fn submit(
        &self,
        record: CreateDeliveryRecord,
        advance_appointment: bool,
    ) -> Result<RecordedOutcome, RecordError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(RecordCommand {
                record,
                advance_appointment,
                reply,
            })
            .await
            .map_err(|_| RecordError::RecorderClosed)?;

        let outcome = response.await.map_err(|_| RecordError::RecorderClosed)??;
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// OutcomeRecorderService
// ---------------------------------------------------------------------------

/// Background service that commits delivery outcomes.
pub struct OutcomeRecorderService;

impl OutcomeRecorderService {
    /// Run the recording loop.
    ///
    /// Each command is committed before the next is read. The loop exits once
    /// every [`OutcomeRecorder`] handle is dropped and the queue is drained.
    pub async fn run(pool: DbPool, mut receiver: mpsc::Receiver<RecordCommand>) {
        while let Some(command) = receiver.recv().await {
            let appointment_id = command.record.appointment_id;
            let status = command.record.status;

            let result = Self::store(&pool, &command.record, command.advance_appointment).await;
            if let Err(e) = &result {
                tracing::error!(
                    appointment_id,
                    status = %status,
                    error = %e,
                    "Failed to record delivery outcome"
                );
            }

            if command.reply.send(result).is_err() {
                tracing::debug!(
                    appointment_id,
                    "Outcome caller went away before the reply"
                );
            }
        }
        tracing::info!("Outcome recorder channel closed, recorder shutting down");
    }

    /// Write one outcome in its own transaction.
    pub async fn store(
        pool: &DbPool,
        input: &CreateDeliveryRecord,
        advance_appointment: bool,
    ) -> Result<RecordedOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let record = DeliveryRecordRepo::insert(&mut *tx, input).await?;
        let transition = if advance_appointment && input.status == DeliveryStatus::Sent {
            Self::advance_appointment(&mut tx, input.appointment_id).await?
        } else {
            StatusTransition::NotApplicable
        };

        tx.commit().await?;
        Ok(RecordedOutcome { record, transition })
    }

    async fn advance_appointment(
        conn: &mut PgConnection,
        appointment_id: DbId,
    ) -> Result<StatusTransition, sqlx::Error> {
        let moved = AppointmentRepo::transition_status(
            &mut *conn,
            appointment_id,
            AppointmentStatus::Scheduled,
            AppointmentStatus::AwaitingConfirmation,
        )
        .await?;
        if moved {
            return Ok(StatusTransition::Applied);
        }

        Ok(match AppointmentRepo::find_status(&mut *conn, appointment_id).await? {
            Some(status) => StatusTransition::AlreadyAdvanced(status),
            None => StatusTransition::AppointmentMissing,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
