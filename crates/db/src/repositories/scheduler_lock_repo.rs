//! Postgres session advisory locks guarding scheduler runs.
//!
//! Session locks belong to the connection that took them, so callers must
//! run both calls on the same dedicated connection.

use sqlx::PgConnection;

pub struct SchedulerLockRepo;

impl SchedulerLockRepo {
    /// Try to take the lock without waiting. `true` if acquired.
    pub async fn try_lock(conn: &mut PgConnection, key: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(conn)
            .await
    }

    /// Release a lock held by this connection. `false` if it was not held.
    pub async fn unlock(conn: &mut PgConnection, key: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(conn)
            .await
    }
}
