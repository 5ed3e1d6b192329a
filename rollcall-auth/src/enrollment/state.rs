//! Redemption state machine.
//!
//! Each enrollment record moves `Unissued -> Issued` exactly once; there is
//! no reverse edge and no renewal.

use super::{token_matches, EnrollmentError};

/// Issuance state of an enrollment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionState {
    Unissued,
    Issued,
}

impl RedemptionState {
    #[must_use]
    pub fn from_issued(issued: bool) -> Self {
        if issued {
            Self::Issued
        } else {
            Self::Unissued
        }
    }

    #[must_use]
    pub fn is_issued(self) -> bool {
        self == Self::Issued
    }

    /// Decide whether `presented` may redeem a record in this state.
    ///
    /// The token comparison always runs, even for issued records, so both
    /// refusals cost the same.
    ///
    /// # Errors
    ///
    /// `TokenMismatch` if the token is wrong, otherwise `AlreadyIssued` if
    /// the record was redeemed before.
    pub fn check_redemption(self, expected: &str, presented: &str) -> Result<(), EnrollmentError> {
        let token_ok = token_matches(expected, presented);
        if !token_ok {
            return Err(EnrollmentError::TokenMismatch);
        }
        if self.is_issued() {
            return Err(EnrollmentError::AlreadyIssued);
        }
        Ok(())
    }
}
