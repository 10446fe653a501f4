//! Rule admission for the rule-management path.

use agenda_core::error::CoreError;
use agenda_core::notification::validate_hours_before;
use agenda_db::models::notification_rule::{CreateNotificationRule, NotificationRule};
use agenda_db::repositories::notification_rule_repo::UNIQUE_RULE_CONSTRAINT;
use agenda_db::repositories::NotificationRuleRepo;
use agenda_db::DbPool;

/// Validate and insert a notification rule.
///
/// An illegal `hours_before` for the type is a [`CoreError::Validation`]; a
/// second rule with the same `(organization, type, hours_before)` is a
/// [`CoreError::Conflict`].
pub async fn create_rule(
    pool: &DbPool,
    input: &CreateNotificationRule,
) -> Result<NotificationRule, CoreError> {
    validate_hours_before(input.notification_type, input.hours_before)?;

    NotificationRuleRepo::create(pool, input)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some(UNIQUE_RULE_CONSTRAINT) => {
                CoreError::Conflict(format!(
                    "a {} rule for {} hours before already exists for organization {}",
                    input.notification_type, input.hours_before, input.organization_id
                ))
            }
            _ => CoreError::Internal(e.to_string()),
        })
}
