//! Certificate issuance.
//!
//! Redeems an enrollment token and signs a certificate binding the record id
//! to the presented device key. Everything that can fail for client reasons
//! is checked before the ledger commits; signing after the commit cannot fail.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rollcall_auth::cert::{CertError, CertificatePayload, IssuedCertificate};
use rollcall_auth::enrollment::EnrollmentError;
use rollcall_auth::identity::{Fingerprint, KeyError, PublicKey};

use crate::authority::Authority;
use crate::ledger::{IssuanceLedger, LedgerError};

/// Issues device certificates against the enrollment ledger.
#[derive(Clone)]
pub struct IssuanceService {
    ledger: IssuanceLedger,
    authority: Arc<Authority>,
    ttl: Duration,
}

impl IssuanceService {
    /// Create a new issuance service.
    ///
    /// `ttl` is how long an issued certificate stays valid.
    pub fn new(ledger: IssuanceLedger, authority: Arc<Authority>, ttl: Duration) -> Self {
        Self {
            ledger,
            authority,
            ttl,
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Redeem `presented_token` for `record_id` and certify `public_key_hex`.
    pub async fn issue(
        &self,
        record_id: &str,
        presented_token: &str,
        public_key_hex: &str,
    ) -> Result<IssuedCertificate, IssuanceError> {
        self.issue_at(record_id, presented_token, public_key_hex, Utc::now())
            .await
    }

    /// [`issue`](Self::issue) with an explicit issuance time.
    pub async fn issue_at(
        &self,
        record_id: &str,
        presented_token: &str,
        public_key_hex: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedCertificate, IssuanceError> {
        let public_key = match PublicKey::from_hex(public_key_hex) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(record_id = %record_id, error = %e, "Rejected malformed public key");
                return Err(IssuanceError::InvalidPublicKey(e));
            }
        };
        let fingerprint = Fingerprint::from_public_key(&public_key);

        tracing::info!(record_id = %record_id, fingerprint = %fingerprint, "Issuance attempt");

        let Some(valid_until) = now.checked_add_signed(self.ttl) else {
            tracing::error!(record_id = %record_id, ttl_secs = self.ttl.num_seconds(), "Certificate expiry out of range");
            return Err(IssuanceError::ExpiryOutOfRange);
        };

        let payload = match CertificatePayload::new(record_id, public_key.clone(), valid_until) {
            Ok(payload) => payload,
            Err(CertError::InvalidExpiry) => {
                tracing::error!(record_id = %record_id, ttl_secs = self.ttl.num_seconds(), "Certificate expiry out of range");
                return Err(IssuanceError::ExpiryOutOfRange);
            }
            Err(e) => {
                tracing::warn!(record_id = %record_id, error = %e, "Rejected certificate subject");
                return Err(IssuanceError::InvalidSubject(e));
            }
        };

        match self
            .ledger
            .redeem(record_id, presented_token, &public_key, payload.valid_until())
            .await
        {
            Ok(()) => {}
            Err(LedgerError::Database(e)) => {
                tracing::error!(record_id = %record_id, error = %e, "Redemption transaction failed");
                return Err(IssuanceError::Storage(e));
            }
            Err(e) => {
                // Reason stays in the log; callers get one opaque failure
                tracing::warn!(record_id = %record_id, fingerprint = %fingerprint, reason = %e, "Redemption refused");
                return Err(e.into());
            }
        }

        let cert = self.authority.sign(payload);

        tracing::info!(
            record_id = %record_id,
            fingerprint = %fingerprint,
            valid_until = %cert.payload().expiry_string(),
            "Certificate issued"
        );

        Ok(cert)
    }
}

/// Errors that can occur while issuing a certificate.
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(#[source] KeyError),
    #[error("enrollment record not found")]
    NotFound,
    #[error("redemption refused: {0}")]
    Rejected(#[source] EnrollmentError),
    #[error("invalid certificate subject: {0}")]
    InvalidSubject(#[source] CertError),
    #[error("certificate expiry out of range")]
    ExpiryOutOfRange,
    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),
}

impl IssuanceError {
    /// Whether this is a credential failure that callers see as one opaque
    /// rejection (unknown record, wrong token, already issued).
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::Rejected(_) | Self::InvalidSubject(_)
        )
    }
}

impl From<LedgerError> for IssuanceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound | LedgerError::UnknownIdentity(_) => Self::NotFound,
            LedgerError::Rejected(e) => Self::Rejected(e),
            LedgerError::Duplicate(_) => Self::Rejected(EnrollmentError::AlreadyIssued),
            LedgerError::Database(e) => Self::Storage(e),
        }
    }
}
