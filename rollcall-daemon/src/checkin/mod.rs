//! Attendance check-in: storage, status policies and revocation hooks.

mod policy;
mod revocation;
mod store;

pub use policy::{AlwaysOnTime, CheckinStatus, SessionSchedule, StatusPolicy};
pub use revocation::{NeverRevoked, RevocationList};
pub use store::{CheckinOutcome, CheckinRecord, CheckinStore};
