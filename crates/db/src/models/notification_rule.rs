//! Notification rule models and DTOs.

use agenda_core::notification::NotificationType;
use agenda_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `notification_rules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationRule {
    pub id: DbId,
    pub organization_id: DbId,
    pub notification_type: String,
    pub hours_before: i32,
    pub is_active: bool,
    pub message_template: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a notification rule.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotificationRule {
    pub organization_id: DbId,
    pub notification_type: NotificationType,
    pub hours_before: i32,
    pub is_active: Option<bool>,
    pub message_template: Option<String>,
}
