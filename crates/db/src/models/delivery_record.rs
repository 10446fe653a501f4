//! Delivery log models and DTOs.

use agenda_core::notification::{AttemptHistory, DeliveryStatus, NotificationType};
use agenda_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_delivery_records` table. Rows are never
/// updated once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeliveryRecord {
    pub id: DbId,
    pub appointment_id: DbId,
    pub notification_type: String,
    pub hours_before: i32,
    pub sent_at: Timestamp,
    pub status: String,
    pub recipient_phone: Option<String>,
    pub channel_instance_name: String,
    pub error_message: Option<String>,
    pub provider_remote_jid: Option<String>,
    pub provider_message_id: Option<String>,
}

/// DTO for appending one delivery attempt.
#[derive(Debug, Clone)]
pub struct CreateDeliveryRecord {
    pub appointment_id: DbId,
    pub notification_type: NotificationType,
    pub hours_before: i32,
    pub status: DeliveryStatus,
    pub recipient_phone: Option<String>,
    pub channel_instance_name: String,
    pub error_message: Option<String>,
    pub provider_remote_jid: Option<String>,
    pub provider_message_id: Option<String>,
}

/// Aggregate counts for one dedup key.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct AttemptCounts {
    pub sent_count: i64,
    pub attempt_count: i64,
}

impl From<AttemptCounts> for AttemptHistory {
    fn from(counts: AttemptCounts) -> Self {
        AttemptHistory {
            sent: counts.sent_count > 0,
            attempts: counts.attempt_count,
        }
    }
}
