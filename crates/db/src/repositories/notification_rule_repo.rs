//! Repository for the `notification_rules` table.

use sqlx::PgPool;

use crate::models::notification_rule::{CreateNotificationRule, NotificationRule};

/// Column list for `notification_rules` queries.
const COLUMNS: &str = "id, organization_id, notification_type, hours_before, is_active, \
    message_template, created_at, updated_at";

/// Name of the unique constraint over `(organization_id, notification_type, hours_before)`.
pub const UNIQUE_RULE_CONSTRAINT: &str = "uq_notification_rules_org_type_hours";

/// Inserts used by rule admission. Active rules are read through the
/// candidate query.
pub struct NotificationRuleRepo;

impl NotificationRuleRepo {
    /// Insert a rule. Legality of `hours_before` is checked by the caller.
    pub async fn create(
        pool: &PgPool,
        input: &CreateNotificationRule,
    ) -> Result<NotificationRule, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_rules \
                (organization_id, notification_type, hours_before, is_active, message_template) \
             VALUES ($1, $2, $3, COALESCE($4, true), $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRule>(&query)
            .bind(input.organization_id)
            .bind(input.notification_type.as_str())
            .bind(input.hours_before)
            .bind(input.is_active)
            .bind(&input.message_template)
            .fetch_one(pool)
            .await
    }
}
