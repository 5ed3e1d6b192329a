//! Device certificates.
//!
//! A certificate binds a subject id (the enrollment record) to a device
//! public key until an expiry instant, signed by the authority key.
//! [`CertificatePayload`] is the byte-exact codec; [`IssuedCertificate`]
//! carries the payload together with its signature and the authority key
//! needed to check it.

mod error;
mod payload;

pub use error::CertError;
pub use payload::{format_expiry, has_expired, parse_expiry, CertificatePayload, EXPIRY_FORMAT, EXPIRY_LEN};

use crate::identity::{PrivateKey, PublicKey, Signature};

/// A signed certificate as returned to the enrolling device.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    payload: CertificatePayload,
    signature: Signature,
    authority: PublicKey,
}

impl IssuedCertificate {
    /// Sign `payload` with the authority key.
    #[must_use]
    pub fn sign(authority: &PrivateKey, payload: CertificatePayload) -> Self {
        let signature = authority.sign(&payload.encode());
        Self {
            payload,
            signature,
            authority: authority.public_key(),
        }
    }

    #[must_use]
    pub fn payload(&self) -> &CertificatePayload {
        &self.payload
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn authority(&self) -> &PublicKey {
        &self.authority
    }

    /// Check the signature against the embedded authority key.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.payload.verify(&self.authority, &self.signature)
    }
}

/// Verify a certificate from its wire fields.
///
/// This is the check an independent verifier performs: rebuild the payload
/// from `(subject_id, public_key, expiry)` and verify `signature` under the
/// authority key. Any malformed field yields `false`.
#[must_use]
pub fn verify_certificate(
    authority: &PublicKey,
    subject_id: &str,
    public_key: &PublicKey,
    expiry: &str,
    signature: &Signature,
) -> bool {
    CertificatePayload::from_parts(subject_id, public_key.clone(), expiry)
        .map(|payload| payload.verify(authority, signature))
        .unwrap_or(false)
}
