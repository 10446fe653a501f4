//! Appointment notification scheduling and delivery.
//!
//! This crate provides the periodic job that turns notification rules into
//! messages:
//!
//! - [`NotificationScheduler`]: finds due candidates, dedups, composes,
//!   throttles and dispatches them, one run per tick.
//! - [`DedupGate`]: consults the delivery log before any work is done.
//! - [`DispatchThrottle`]: paces dispatches per throttle key.
//! - [`delivery`]: the messaging gateway client and the alert mailer.
//! - [`OutcomeRecorder`] / [`OutcomeRecorderService`]: persistence actor that
//!   commits each delivery outcome in its own transaction.
//! - [`DisconnectionAlerter`]: tells organizations their channel is down.
//! - [`RunLock`]: cross-process guard so two runs never overlap.
//! - [`rules`]: rule admission for the rule-management path.

pub mod alerter;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod recorder;
pub mod rules;
pub mod run_lock;
pub mod scheduler;
pub mod throttle;

pub use alerter::DisconnectionAlerter;
pub use config::{RateLimitScope, SchedulerConfig};
pub use dedup::DedupGate;
pub use delivery::email::{AlertMailer, EmailConfig, EmailDelivery};
pub use delivery::gateway::{GatewayConfig, MessageGateway, TextGatewayClient};
pub use recorder::{OutcomeRecorder, OutcomeRecorderService};
pub use run_lock::RunLock;
pub use scheduler::{NotificationScheduler, PhaseSummary, RunSummary};
pub use throttle::DispatchThrottle;
