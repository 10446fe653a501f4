//! Appointment status reads and the single status transition this service owns.

use agenda_core::notification::AppointmentStatus;
use agenda_core::types::DbId;
use sqlx::PgExecutor;

/// Narrow access to `appointments`.
pub struct AppointmentRepo;

impl AppointmentRepo {
    /// Current status of an appointment, or `None` if it does not exist.
    pub async fn find_status<'e, E>(executor: E, id: DbId) -> Result<Option<String>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar("SELECT status FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Move an appointment from `from` to `to`.
    ///
    /// Returns `true` if the row was in `from` and was updated, `false` if the
    /// appointment is missing or in another status.
    pub async fn transition_status<'e, E>(
        executor: E,
        id: DbId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE appointments \
             SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
