//! Due-notification projection.

use agenda_core::notification::{DedupKey, NotificationType, RuleError};
use agenda_core::template::{timezone_or_default, TemplateContext};
use agenda_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// One appointment joined with one active rule horizon that is due.
///
/// Computed per run and never stored.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationCandidate {
    pub appointment_id: DbId,
    pub organization_id: DbId,
    pub organization_name: String,
    pub organization_contact_email: Option<String>,
    pub organization_timezone: String,
    pub address: Option<String>,
    pub channel_instance_name: String,
    pub channel_connected: bool,
    pub recipient_phone: Option<String>,
    pub recipient_name: String,
    pub scheduled_at: Timestamp,
    pub service_name: Option<String>,
    pub employee_name: Option<String>,
    pub price_cents: Option<i64>,
    pub notification_type: String,
    pub hours_before: i32,
    pub message_template: Option<String>,
}

impl NotificationCandidate {
    pub fn kind(&self) -> Result<NotificationType, RuleError> {
        self.notification_type.parse()
    }

    pub fn dedup_key(&self, kind: NotificationType) -> DedupKey {
        DedupKey {
            appointment_id: self.appointment_id,
            kind,
            hours_before: self.hours_before,
        }
    }

    /// Values exposed to message templates.
    pub fn template_context(&self) -> TemplateContext<'_> {
        TemplateContext {
            client_name: &self.recipient_name,
            scheduled_at: self.scheduled_at,
            timezone: timezone_or_default(&self.organization_timezone),
            service_name: self.service_name.as_deref(),
            professional_name: self.employee_name.as_deref(),
            address: self.address.as_deref(),
            price_cents: self.price_cents,
            business_name: &self.organization_name,
        }
    }
}
