//! Outbound delivery: the messaging gateway that carries client
//! notifications, and SMTP for operator-facing alerts.

pub mod email;
pub mod gateway;
