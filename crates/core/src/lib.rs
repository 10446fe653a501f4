//! Domain building blocks for appointment notification delivery.
//!
//! Everything in this crate is pure: no database, no network. The `db` and
//! `notifications` crates build on these types.

pub mod error;
pub mod notification;
pub mod phone;
pub mod rate_limit;
pub mod template;
pub mod types;
