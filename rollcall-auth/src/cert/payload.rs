//! Certificate payload codec.
//!
//! The payload is what the authority signs and what every verifier must
//! rebuild byte-for-byte from the same three fields:
//!
//! ```text
//! 2 bytes   subject id length N (big-endian u16, 1..=65535)
//! N bytes   subject id (UTF-8)
//! 32 bytes  device public key (raw Ed25519)
//! 19 bytes  expiry, ASCII "YYYY-MM-DD HH:MM:SS" in UTC
//! ```
//!
//! The length prefix makes the encoding self-delimiting, and the two
//! trailing fields are fixed width, so distinct field triples never share
//! an encoding.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::CertError;
use crate::identity::{PublicKey, Signature, PUBLIC_KEY_LEN};

/// Whether a certificate valid until `valid_until` has expired at `now`.
///
/// The expiry instant itself is already expired.
#[must_use]
pub fn has_expired(valid_until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= valid_until
}

/// `strftime` format of the expiry field.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of the rendered expiry field in bytes.
pub const EXPIRY_LEN: usize = 19;

const LENGTH_PREFIX_LEN: usize = 2;

/// The signed content of a device certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePayload {
    subject_id: String,
    public_key: PublicKey,
    valid_until: DateTime<Utc>,
}

impl CertificatePayload {
    /// Build a payload, truncating `valid_until` to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns `CertError::SubjectLength` for an empty or oversized subject,
    /// and `CertError::InvalidExpiry` for instants that don't render in the
    /// fixed 19-character format (years outside 0000-9999).
    pub fn new(
        subject_id: impl Into<String>,
        public_key: PublicKey,
        valid_until: DateTime<Utc>,
    ) -> Result<Self, CertError> {
        let subject_id = subject_id.into();
        check_subject(&subject_id)?;

        let valid_until = DateTime::from_timestamp(valid_until.timestamp(), 0)
            .ok_or(CertError::InvalidExpiry)?;
        if format_expiry(&valid_until).len() != EXPIRY_LEN {
            return Err(CertError::InvalidExpiry);
        }

        Ok(Self {
            subject_id,
            public_key,
            valid_until,
        })
    }

    /// Rebuild a payload from its wire fields, as a verifier would.
    ///
    /// # Errors
    ///
    /// Returns `CertError::InvalidExpiry` unless `expiry` is exactly in
    /// [`EXPIRY_FORMAT`], plus the errors of [`CertificatePayload::new`].
    pub fn from_parts(
        subject_id: impl Into<String>,
        public_key: PublicKey,
        expiry: &str,
    ) -> Result<Self, CertError> {
        Self::new(subject_id, public_key, parse_expiry(expiry)?)
    }

    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    #[must_use]
    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    /// The expiry rendered as it appears in the payload and on the wire.
    #[must_use]
    pub fn expiry_string(&self) -> String {
        format_expiry(&self.valid_until)
    }

    /// Whether the certificate has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        has_expired(self.valid_until, now)
    }

    /// Encode into the signed byte layout.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let subject = self.subject_id.as_bytes();
        let expiry = self.expiry_string();

        let mut bytes =
            Vec::with_capacity(LENGTH_PREFIX_LEN + subject.len() + PUBLIC_KEY_LEN + EXPIRY_LEN);
        // `new` bounds the subject length to u16
        bytes.extend_from_slice(&(subject.len() as u16).to_be_bytes());
        bytes.extend_from_slice(subject);
        bytes.extend_from_slice(&self.public_key.to_bytes());
        bytes.extend_from_slice(expiry.as_bytes());
        bytes
    }

    /// Decode the signed byte layout.
    ///
    /// # Errors
    ///
    /// Fails unless the input is exactly one well-formed payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, CertError> {
        let Some((prefix, rest)) = bytes.split_first_chunk::<LENGTH_PREFIX_LEN>() else {
            return Err(CertError::LengthMismatch {
                expected: LENGTH_PREFIX_LEN,
                actual: bytes.len(),
            });
        };
        let subject_len = u16::from_be_bytes(*prefix) as usize;

        let expected = subject_len + PUBLIC_KEY_LEN + EXPIRY_LEN;
        if rest.len() != expected {
            return Err(CertError::LengthMismatch {
                expected: LENGTH_PREFIX_LEN + expected,
                actual: bytes.len(),
            });
        }

        let (subject, rest) = rest.split_at(subject_len);
        let (public_key, expiry) = rest.split_at(PUBLIC_KEY_LEN);

        let subject_id =
            std::str::from_utf8(subject).map_err(|_| CertError::SubjectEncoding)?;
        let public_key =
            PublicKey::from_bytes(public_key).map_err(|_| CertError::InvalidPublicKey)?;
        let expiry = std::str::from_utf8(expiry).map_err(|_| CertError::InvalidExpiry)?;

        Self::from_parts(subject_id, public_key, expiry)
    }

    /// Check an authority signature over this payload.
    #[must_use]
    pub fn verify(&self, authority: &PublicKey, signature: &Signature) -> bool {
        authority.verify(&self.encode(), signature)
    }
}

/// Render an instant in [`EXPIRY_FORMAT`].
#[must_use]
pub fn format_expiry(at: &DateTime<Utc>) -> String {
    at.format(EXPIRY_FORMAT).to_string()
}

/// Parse an expiry string, accepting only the canonical rendering.
///
/// # Errors
///
/// Returns `CertError::InvalidExpiry` if the string is not exactly the
/// zero-padded `YYYY-MM-DD HH:MM:SS` form of some instant.
pub fn parse_expiry(expiry: &str) -> Result<DateTime<Utc>, CertError> {
    let parsed = NaiveDateTime::parse_from_str(expiry, EXPIRY_FORMAT)
        .map_err(|_| CertError::InvalidExpiry)?
        .and_utc();

    // chrono accepts unpadded fields; re-render so only one spelling is valid
    if format_expiry(&parsed) != expiry {
        return Err(CertError::InvalidExpiry);
    }
    Ok(parsed)
}

fn check_subject(subject_id: &str) -> Result<(), CertError> {
    let len = subject_id.len();
    if len == 0 || len > u16::MAX as usize {
        return Err(CertError::SubjectLength(len));
    }
    Ok(())
}
