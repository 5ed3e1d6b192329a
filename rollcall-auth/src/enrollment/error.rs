//! Enrollment error types.

/// Reasons a redemption attempt is refused.
///
/// Callers outside the issuer must not be able to tell these apart; the
/// distinction exists for logging only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    /// The presented token does not match the record's token.
    #[error("token mismatch")]
    TokenMismatch,

    /// The record has already been redeemed.
    #[error("already issued")]
    AlreadyIssued,
}
