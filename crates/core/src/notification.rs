//! Notification kinds, delivery statuses and rule legality.
//!
//! The string forms returned by the `as_str` methods are the values stored in
//! the `notification_rules.notification_type`,
//! `notification_delivery_records.status` and `appointments.status` columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a notification rule is not acceptable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("unknown notification type '{0}'")]
    UnknownType(String),

    #[error("hours_before {hours} is not allowed for {kind} (allowed: {allowed:?})")]
    IllegalHoursBefore {
        kind: NotificationType,
        hours: i32,
        allowed: &'static [i32],
    },
}

impl From<RuleError> for CoreError {
    fn from(err: RuleError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// NotificationType
// ---------------------------------------------------------------------------

/// Hour horizons a confirmation rule may use.
pub const CONFIRMATION_HOURS_BEFORE: &[i32] = &[12, 24, 36, 48];

/// Hour horizons a reminder rule may use.
pub const REMINDER_HOURS_BEFORE: &[i32] = &[1, 2, 3, 4, 5, 6];

/// The two kinds of appointment notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Asks the client to confirm attendance; moves the appointment to
    /// [`AppointmentStatus::AwaitingConfirmation`] once sent.
    Confirmation,
    /// Plain reminder; never touches the appointment.
    Reminder,
}

impl NotificationType {
    /// Processing order of a scheduler run.
    pub const ALL: [NotificationType; 2] = [NotificationType::Confirmation, NotificationType::Reminder];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Confirmation => "CONFIRMATION",
            NotificationType::Reminder => "REMINDER",
        }
    }

    /// Legal `hours_before` values for rules of this type.
    pub fn allowed_hours_before(self) -> &'static [i32] {
        match self {
            NotificationType::Confirmation => CONFIRMATION_HOURS_BEFORE,
            NotificationType::Reminder => REMINDER_HOURS_BEFORE,
        }
    }

    /// Appointment statuses for which a notification of this type may still go out.
    pub fn eligible_appointment_statuses(self) -> &'static [AppointmentStatus] {
        match self {
            // Later horizons still go out after the first one moved the
            // appointment to AWAITING_CONFIRMATION.
            NotificationType::Confirmation => &[
                AppointmentStatus::Scheduled,
                AppointmentStatus::AwaitingConfirmation,
            ],
            NotificationType::Reminder => &[
                AppointmentStatus::Scheduled,
                AppointmentStatus::AwaitingConfirmation,
                AppointmentStatus::Confirmed,
            ],
        }
    }

    /// Whether a successful send of this type advances the appointment status.
    pub fn transitions_appointment(self) -> bool {
        matches!(self, NotificationType::Confirmation)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMATION" => Ok(NotificationType::Confirmation),
            "REMINDER" => Ok(NotificationType::Reminder),
            other => Err(RuleError::UnknownType(other.to_string())),
        }
    }
}

/// Check that `hours` is a legal horizon for `kind`.
pub fn validate_hours_before(kind: NotificationType, hours: i32) -> Result<(), RuleError> {
    let allowed = kind.allowed_hours_before();
    if allowed.contains(&hours) {
        Ok(())
    } else {
        Err(RuleError::IllegalHoursBefore {
            kind,
            hours,
            allowed,
        })
    }
}

// ---------------------------------------------------------------------------
// DeliveryStatus
// ---------------------------------------------------------------------------

/// Terminal outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENT" => Ok(DeliveryStatus::Sent),
            "FAILED" => Ok(DeliveryStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "unknown delivery status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// AppointmentStatus
// ---------------------------------------------------------------------------

/// Appointment lifecycle states relevant to notification delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    AwaitingConfirmation,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::NoShow => "NO_SHOW",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(AppointmentStatus::Scheduled),
            "AWAITING_CONFIRMATION" => Ok(AppointmentStatus::AwaitingConfirmation),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "NO_SHOW" => Ok(AppointmentStatus::NoShow),
            other => Err(CoreError::Validation(format!(
                "unknown appointment status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Dedup key and retry policy
// ---------------------------------------------------------------------------

/// Identifies one notification opportunity: a rule horizon for an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub appointment_id: DbId,
    pub kind: NotificationType,
    pub hours_before: i32,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}h", self.appointment_id, self.kind, self.hours_before)
    }
}

/// What the delivery log already holds for one [`DedupKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptHistory {
    /// A SENT record exists.
    pub sent: bool,
    /// Total records, SENT and FAILED.
    pub attempts: i64,
}

/// How many attempts a notification opportunity gets across runs.
///
/// `max_attempts = 1` means any prior record, successful or not, suppresses
/// the candidate. Higher values let FAILED attempts be retried on later runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRetryPolicy {
    pub max_attempts: u32,
}

impl DeliveryRetryPolicy {
    pub const NEVER_RETRY: DeliveryRetryPolicy = DeliveryRetryPolicy { max_attempts: 1 };

    /// Build a policy; zero is clamped to one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Whether another attempt may be made given the recorded history.
    pub fn allows_attempt(&self, history: &AttemptHistory) -> bool {
        !history.sent && history.attempts < i64::from(self.max_attempts)
    }
}

impl Default for DeliveryRetryPolicy {
    fn default() -> Self {
        Self::NEVER_RETRY
    }
}

// ---------------------------------------------------------------------------
// EvaluationWindow
// ---------------------------------------------------------------------------

/// Half-open range `[start, end)` of due instants a run is responsible for.
///
/// A candidate's due instant is `scheduled_at - hours_before`. Consecutive
/// windows overlap when the catch-up span exceeds the run interval; the
/// delivery log makes the overlap harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl EvaluationWindow {
    /// The window of length `catch_up` that ends at `now`.
    pub fn ending_at(now: Timestamp, catch_up: chrono::Duration) -> Self {
        Self {
            start: now - catch_up,
            end: now,
        }
    }

    /// Due instant of a rule horizon for an appointment.
    pub fn due_at(scheduled_at: Timestamp, hours_before: i32) -> Timestamp {
        scheduled_at - chrono::Duration::hours(i64::from(hours_before))
    }

    /// Whether a candidate is due in this window. The appointment itself must
    /// still lie in the future relative to the window end.
    pub fn is_due(&self, scheduled_at: Timestamp, hours_before: i32) -> bool {
        let due = Self::due_at(scheduled_at, hours_before);
        due >= self.start && due < self.end && scheduled_at > self.end
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
