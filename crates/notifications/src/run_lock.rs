//! Cross-process guard against overlapping scheduler runs.

use agenda_db::repositories::SchedulerLockRepo;
use agenda_db::DbPool;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

/// Advisory lock key reserved for the notification scheduler.
pub const SCHEDULER_LOCK_KEY: i64 = 0x4147_454E_4441_0001;

/// A held session advisory lock.
///
/// The lock lives on a dedicated pooled connection that is closed instead of
/// returned to the pool when dropped, so a run that is cancelled before
/// [`release`](Self::release) still frees the lock.
pub struct RunLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

impl RunLock {
    /// Take the lock without waiting. `None` if another session holds it.
    pub async fn try_acquire(pool: &DbPool, key: i64) -> Result<Option<Self>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        if !SchedulerLockRepo::try_lock(&mut conn, key).await? {
            return Ok(None);
        }
        conn.close_on_drop();
        Ok(Some(Self { conn, key }))
    }

    pub async fn release(mut self) -> Result<(), sqlx::Error> {
        if !SchedulerLockRepo::unlock(&mut self.conn, self.key).await? {
            tracing::warn!(key = self.key, "Scheduler lock was not held at release");
        }
        Ok(())
    }
}
