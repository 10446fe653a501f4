//! Due-candidate query over appointments, organizations, channels and rules.

use agenda_core::notification::{EvaluationWindow, NotificationType};
use sqlx::PgPool;

use crate::models::candidate::NotificationCandidate;

/// Finds appointments with an active rule horizon due in a window.
pub struct CandidateRepo;

impl CandidateRepo {
    /// Candidates of `kind` whose due instant (`scheduled_at - hours_before`)
    /// falls in `[window.start, window.end)`.
    ///
    /// Only future appointments in a status eligible for `kind` are returned,
    /// and only for organizations that have a messaging channel. Disconnected
    /// channels are included with `channel_connected = false`.
    pub async fn find_due(
        pool: &PgPool,
        kind: NotificationType,
        window: &EvaluationWindow,
    ) -> Result<Vec<NotificationCandidate>, sqlx::Error> {
        let statuses: Vec<&str> = kind
            .eligible_appointment_statuses()
            .iter()
            .map(|s| s.as_str())
            .collect();

        sqlx::query_as::<_, NotificationCandidate>(
            "SELECT a.id AS appointment_id, \
                    a.organization_id, \
                    o.name AS organization_name, \
                    o.contact_email AS organization_contact_email, \
                    o.timezone AS organization_timezone, \
                    o.address, \
                    mc.instance_name AS channel_instance_name, \
                    mc.is_connected AS channel_connected, \
                    c.phone AS recipient_phone, \
                    c.name AS recipient_name, \
                    a.scheduled_at, \
                    s.name AS service_name, \
                    e.name AS employee_name, \
                    s.price_cents, \
                    r.notification_type, \
                    r.hours_before, \
                    r.message_template \
             FROM appointments a \
             JOIN organizations o ON o.id = a.organization_id \
             JOIN clients c ON c.id = a.client_id \
             JOIN messaging_channels mc ON mc.organization_id = a.organization_id \
             JOIN notification_rules r \
               ON r.organization_id = a.organization_id \
              AND r.is_active = true \
              AND r.notification_type = $1 \
             LEFT JOIN services s ON s.id = a.service_id \
             LEFT JOIN employees e ON e.id = a.employee_id \
             WHERE a.status = ANY($2) \
               AND a.scheduled_at > $4 \
               AND a.scheduled_at - make_interval(hours => r.hours_before) >= $3 \
               AND a.scheduled_at - make_interval(hours => r.hours_before) < $4 \
             ORDER BY a.scheduled_at, a.id, r.hours_before",
        )
        .bind(kind.as_str())
        .bind(statuses)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(pool)
        .await
    }

    /// Confirmation candidates due in `window`.
    pub async fn find_due_confirmations(
        pool: &PgPool,
        window: &EvaluationWindow,
    ) -> Result<Vec<NotificationCandidate>, sqlx::Error> {
        Self::find_due(pool, NotificationType::Confirmation, window).await
    }

    /// Reminder candidates due in `window`.
    pub async fn find_due_reminders(
        pool: &PgPool,
        window: &EvaluationWindow,
    ) -> Result<Vec<NotificationCandidate>, sqlx::Error> {
        Self::find_due(pool, NotificationType::Reminder, window).await
    }
}
