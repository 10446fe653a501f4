//! Delivery-log lookups that decide whether a candidate is already handled.

use agenda_core::notification::{DedupKey, DeliveryRetryPolicy};
use agenda_db::repositories::DeliveryRecordRepo;
use agenda_db::DbPool;

/// Filters candidates against prior delivery records.
#[derive(Clone)]
pub struct DedupGate {
    pool: DbPool,
    policy: DeliveryRetryPolicy,
}

impl DedupGate {
    pub fn new(pool: DbPool, policy: DeliveryRetryPolicy) -> Self {
        Self { pool, policy }
    }

    /// Whether any record, SENT or FAILED, exists for the key.
    pub async fn exists(&self, key: &DedupKey) -> Result<bool, sqlx::Error> {
        DeliveryRecordRepo::exists(&self.pool, key).await
    }

    /// Whether the candidate must be skipped under the retry policy.
    ///
    /// A SENT record always suppresses. FAILED records suppress once their
    /// count reaches `max_attempts`.
    pub async fn should_skip(&self, key: &DedupKey) -> Result<bool, sqlx::Error> {
        if self.policy == DeliveryRetryPolicy::NEVER_RETRY {
            return self.exists(key).await;
        }
        let history = DeliveryRecordRepo::attempt_history(&self.pool, key).await?;
        Ok(!self.policy.allows_attempt(&history))
    }
}
