//! Certificate codec error types.

/// Errors produced while encoding or decoding a certificate payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CertError {
    /// The subject id is empty or longer than the length prefix allows.
    #[error("subject id length {0} out of range")]
    SubjectLength(usize),

    /// The payload is shorter or longer than its length prefix implies.
    #[error("payload length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The subject id is not valid UTF-8.
    #[error("subject id is not valid UTF-8")]
    SubjectEncoding,

    /// The embedded public key is not a valid Ed25519 point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The expiry is not a `YYYY-MM-DD HH:MM:SS` timestamp.
    #[error("invalid expiry timestamp")]
    InvalidExpiry,
}
