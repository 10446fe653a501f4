//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct matching the
//! database row, plus a `Create*` DTO where this service inserts rows.

pub mod candidate;
pub mod delivery_record;
pub mod notification_rule;
