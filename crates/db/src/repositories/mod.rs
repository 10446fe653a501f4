//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Methods that may run inside a caller-owned transaction accept any
//! [`sqlx::PgExecutor`]; the rest take `&PgPool`.

pub mod appointment_repo;
pub mod candidate_repo;
pub mod delivery_record_repo;
pub mod notification_rule_repo;
pub mod scheduler_lock_repo;

pub use appointment_repo::AppointmentRepo;
pub use candidate_repo::CandidateRepo;
pub use delivery_record_repo::DeliveryRecordRepo;
pub use notification_rule_repo::NotificationRuleRepo;
pub use scheduler_lock_repo::SchedulerLockRepo;
