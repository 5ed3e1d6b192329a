//! Attendance check-in.
//!
//! A certificate id is the only credential. It resolves to an identity only
//! while the certificate is issued, unexpired and not revoked; every other
//! case is the same `Unauthorized`.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use rollcall_auth::cert::has_expired;

use crate::checkin::{CheckinOutcome, CheckinStore, RevocationList, StatusPolicy};
use crate::ledger::{IssuanceLedger, LedgerError};

/// The identity a certificate id resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub record_id: String,
    pub identity_id: String,
    pub name: String,
}

/// Resolves certificates and records check-ins.
#[derive(Clone)]
pub struct CheckinService {
    ledger: IssuanceLedger,
    store: CheckinStore,
    policy: Arc<dyn StatusPolicy>,
    revocations: Arc<dyn RevocationList>,
    offset: FixedOffset,
}

impl CheckinService {
    /// Create a new check-in service.
    ///
    /// Calendar days and session times are taken at `offset` from UTC.
    pub fn new(
        ledger: IssuanceLedger,
        store: CheckinStore,
        policy: Arc<dyn StatusPolicy>,
        revocations: Arc<dyn RevocationList>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            ledger,
            store,
            policy,
            revocations,
            offset,
        }
    }

    /// Resolve a certificate id to the identity it was issued for.
    pub async fn resolve_identity(
        &self,
        certificate_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ResolvedIdentity, CheckinError> {
        let holder = match self.ledger.certificate_holder(certificate_id).await {
            Ok(Some(holder)) => holder,
            Ok(None) => {
                tracing::warn!(certificate_id = %certificate_id, "Unknown certificate");
                return Err(CheckinError::Unauthorized);
            }
            Err(LedgerError::Database(e)) => return Err(CheckinError::Storage(e)),
            Err(e) => {
                tracing::error!(error = %e, "Certificate lookup failed");
                return Err(CheckinError::Unauthorized);
            }
        };

        if !holder.issued {
            tracing::warn!(certificate_id = %certificate_id, "Certificate not yet issued");
            return Err(CheckinError::Unauthorized);
        }

        let live = holder
            .valid_until
            .is_some_and(|valid_until| !has_expired(valid_until, now));
        if !live {
            tracing::warn!(certificate_id = %certificate_id, "Certificate expired");
            return Err(CheckinError::Unauthorized);
        }

        if self.revocations.is_revoked(&holder.record_id) {
            tracing::warn!(certificate_id = %certificate_id, "Certificate revoked");
            return Err(CheckinError::Unauthorized);
        }

        Ok(ResolvedIdentity {
            record_id: holder.record_id,
            identity_id: holder.identity_id,
            name: holder.identity_name,
        })
    }

    /// Record a check-in for `identity` in `session_id` at `now`.
    pub async fn record_checkin(
        &self,
        identity: &ResolvedIdentity,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome, CheckinError> {
        let local = now.with_timezone(&self.offset);
        let status = self.policy.status(session_id, local.time());

        let outcome = self
            .store
            .record(&identity.identity_id, session_id, local.date_naive(), now, status)
            .await
            .map_err(|e| {
                tracing::error!(identity_id = %identity.identity_id, session_id, error = %e, "Check-in transaction failed");
                CheckinError::Storage(e)
            })?;

        let record = outcome.record();
        if outcome.is_created() {
            tracing::info!(
                identity_id = %identity.identity_id,
                session_id,
                day = %record.day,
                status = %record.status,
                "Check-in created"
            );
        } else {
            tracing::info!(
                identity_id = %identity.identity_id,
                session_id,
                day = %record.day,
                "Check-in updated"
            );
        }

        Ok(outcome)
    }

    /// Resolve `certificate_id` and record a check-in for it.
    pub async fn check_in(
        &self,
        certificate_id: &str,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(ResolvedIdentity, CheckinOutcome), CheckinError> {
        let identity = self.resolve_identity(certificate_id, now).await?;
        let outcome = self.record_checkin(&identity, session_id, now).await?;
        Ok((identity, outcome))
    }
}

/// Errors that can occur during check-in.
#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}
