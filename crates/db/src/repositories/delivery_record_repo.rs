//! Repository for the append-only `notification_delivery_records` table.

use agenda_core::notification::{AttemptHistory, DedupKey};
use agenda_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::delivery_record::{AttemptCounts, CreateDeliveryRecord, DeliveryRecord};

/// Column list for `notification_delivery_records` queries.
const COLUMNS: &str = "id, appointment_id, notification_type, hours_before, sent_at, status, \
    recipient_phone, channel_instance_name, error_message, provider_remote_jid, \
    provider_message_id";

/// Insert and lookup operations for delivery records. There is no update or
/// delete: the log is append-only.
pub struct DeliveryRecordRepo;

impl DeliveryRecordRepo {
    /// Append a record, returning the stored row.
    pub async fn insert<'e, E>(
        executor: E,
        input: &CreateDeliveryRecord,
    ) -> Result<DeliveryRecord, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO notification_delivery_records \
                (appointment_id, notification_type, hours_before, status, recipient_phone, \
                 channel_instance_name, error_message, provider_remote_jid, provider_message_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeliveryRecord>(&query)
            .bind(input.appointment_id)
            .bind(input.notification_type.as_str())
            .bind(input.hours_before)
            .bind(input.status.as_str())
            .bind(&input.recipient_phone)
            .bind(&input.channel_instance_name)
            .bind(&input.error_message)
            .bind(&input.provider_remote_jid)
            .bind(&input.provider_message_id)
            .fetch_one(executor)
            .await
    }

    /// Whether any record, SENT or FAILED, exists for the key.
    pub async fn exists(pool: &PgPool, key: &DedupKey) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM notification_delivery_records \
                WHERE appointment_id = $1 AND notification_type = $2 AND hours_before = $3 \
             )",
        )
        .bind(key.appointment_id)
        .bind(key.kind.as_str())
        .bind(key.hours_before)
        .fetch_one(pool)
        .await
    }

    /// SENT flag and total attempt count for the key.
    pub async fn attempt_history(
        pool: &PgPool,
        key: &DedupKey,
    ) -> Result<AttemptHistory, sqlx::Error> {
        let counts = sqlx::query_as::<_, AttemptCounts>(
            "SELECT COUNT(*) FILTER (WHERE status = 'SENT') AS sent_count, \
                    COUNT(*) AS attempt_count \
             FROM notification_delivery_records \
             WHERE appointment_id = $1 AND notification_type = $2 AND hours_before = $3",
        )
        .bind(key.appointment_id)
        .bind(key.kind.as_str())
        .bind(key.hours_before)
        .fetch_one(pool)
        .await?;
        Ok(counts.into())
    }

    /// All records for an appointment, oldest first.
    pub async fn list_for_appointment(
        pool: &PgPool,
        appointment_id: DbId,
    ) -> Result<Vec<DeliveryRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_delivery_records \
             WHERE appointment_id = $1 \
             ORDER BY sent_at, id"
        );
        sqlx::query_as::<_, DeliveryRecord>(&query)
            .bind(appointment_id)
            .fetch_all(pool)
            .await
    }
}
