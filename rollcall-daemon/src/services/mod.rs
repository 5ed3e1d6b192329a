//! Issuance and check-in services.

mod checkin;
mod issuance;

pub use checkin::{CheckinError, CheckinService, ResolvedIdentity};
pub use issuance::{IssuanceError, IssuanceService};
