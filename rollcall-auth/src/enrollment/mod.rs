//! Enrollment secrets and the one-shot redemption rule.
//!
//! The flow is:
//! 1. An operator provisions an enrollment record with a fresh token
//! 2. The token is delivered to the device out-of-band
//! 3. The device generates its own keypair and presents token + public key
//! 4. The issuer checks the token with [`RedemptionState::check_redemption`]
//!    and, on success, consumes the record and signs a certificate
//!
//! # Security
//!
//! - Token comparison is constant-time
//! - A record can be redeemed at most once

mod error;
mod state;
mod token;

pub use error::EnrollmentError;
pub use state::RedemptionState;
pub use token::{generate_token, token_matches};
