//! Persistent issuance ledger.
//!
//! One row per enrollment record. The ledger is the only authority on
//! whether a token may still be redeemed; redemption is a single
//! transaction whose write is guarded by `issued = 0`.

use chrono::{DateTime, Utc};
use rollcall_auth::enrollment::{EnrollmentError, RedemptionState};
use rollcall_auth::identity::PublicKey;
use sqlx::{Row, SqlitePool};

use crate::db::{decode_timestamp, encode_timestamp};

/// Persistent store of enrollment records and the identities they map to.
#[derive(Clone)]
pub struct IssuanceLedger {
    pool: SqlitePool,
}

/// An enrollment record as stored in the ledger.
#[derive(Clone)]
pub struct EnrollmentRecord {
    pub record_id: String,
    pub identity_id: String,
    pub expected_token: String,
    pub bound_public_key: Option<Vec<u8>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub issued: bool,
}

impl std::fmt::Debug for EnrollmentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentRecord")
            .field("record_id", &self.record_id)
            .field("identity_id", &self.identity_id)
            .field("expected_token", &"[redacted]")
            .field("bound_public_key", &self.bound_public_key.as_deref().map(hex_prefix))
            .field("valid_until", &self.valid_until)
            .field("issued", &self.issued)
            .finish()
    }
}

/// The identity a certificate id resolves to, with its issuance state.
#[derive(Debug, Clone)]
pub struct CertificateHolder {
    pub record_id: String,
    pub identity_id: String,
    pub identity_name: String,
    pub issued: bool,
    pub valid_until: Option<DateTime<Utc>>,
}

impl IssuanceLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register an identity (the subject enrollment records point at).
    pub async fn add_identity(&self, identity_id: &str, name: &str) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "INSERT INTO identities (identity_id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(identity_id) DO NOTHING",
        )
        .bind(identity_id)
        .bind(name)
        .bind(encode_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::Duplicate(identity_id.to_string()));
        }
        Ok(())
    }

    /// Provision an unissued enrollment record for an existing identity.
    pub async fn create_record(
        &self,
        record_id: &str,
        identity_id: &str,
        expected_token: &str,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let identity = sqlx::query("SELECT 1 FROM identities WHERE identity_id = ?")
            .bind(identity_id)
            .fetch_optional(&mut *tx)
            .await?;
        if identity.is_none() {
            return Err(LedgerError::UnknownIdentity(identity_id.to_string()));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO enrollments (record_id, identity_id, expected_token, issued, created_at)
            VALUES (?, ?, ?, 0, ?)
            ON CONFLICT(record_id) DO NOTHING
            "#,
        )
        .bind(record_id)
        .bind(identity_id)
        .bind(expected_token)
        .bind(encode_timestamp(&Utc::now()))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::Duplicate(record_id.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Fetch a record by id.
    pub async fn lookup(&self, record_id: &str) -> Result<EnrollmentRecord, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT record_id, identity_id, expected_token, bound_public_key, valid_until, issued
            FROM enrollments
            WHERE record_id = ?
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::NotFound)?;

        let valid_until = row
            .try_get::<Option<String>, _>("valid_until")?
            .map(|s| decode_timestamp("valid_until", &s))
            .transpose()?;

        Ok(EnrollmentRecord {
            record_id: row.try_get("record_id")?,
            identity_id: row.try_get("identity_id")?,
            expected_token: row.try_get("expected_token")?,
            bound_public_key: row.try_get("bound_public_key")?,
            valid_until,
            issued: row.try_get::<i64, _>("issued")? != 0,
        })
    }

    /// Consume the record's token and bind `public_key` until `valid_until`.
    ///
    /// Read, token check and write share one transaction, and the write only
    /// applies while `issued = 0`. Of any number of concurrent attempts at
    /// most one returns `Ok`; every failure leaves the record untouched.
    pub async fn redeem(
        &self,
        record_id: &str,
        presented_token: &str,
        public_key: &PublicKey,
        valid_until: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT expected_token, issued FROM enrollments WHERE record_id = ?")
            .bind(record_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound)?;

        let expected_token: String = row.try_get("expected_token")?;
        let issued = row.try_get::<i64, _>("issued")? != 0;
        RedemptionState::from_issued(issued).check_redemption(&expected_token, presented_token)?;

        let result = sqlx::query(
            r#"
            UPDATE enrollments
            SET issued = 1, bound_public_key = ?, valid_until = ?, issued_at = ?
            WHERE record_id = ? AND issued = 0
            "#,
        )
        .bind(public_key.to_bytes().to_vec())
        .bind(encode_timestamp(&valid_until))
        .bind(encode_timestamp(&Utc::now()))
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            // Lost the race to a concurrent redemption
            return Err(EnrollmentError::AlreadyIssued.into());
        }

        tx.commit().await?;
        Ok(())
    }

    /// Resolve a certificate id to its holder, if the record exists.
    pub async fn certificate_holder(
        &self,
        record_id: &str,
    ) -> Result<Option<CertificateHolder>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT e.record_id, e.identity_id, i.name, e.issued, e.valid_until
            FROM enrollments e
            INNER JOIN identities i ON e.identity_id = i.identity_id
            WHERE e.record_id = ?
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let valid_until = row
            .try_get::<Option<String>, _>("valid_until")?
            .map(|s| decode_timestamp("valid_until", &s))
            .transpose()?;

        Ok(Some(CertificateHolder {
            record_id: row.try_get("record_id")?,
            identity_id: row.try_get("identity_id")?,
            identity_name: row.try_get("name")?,
            issued: row.try_get::<i64, _>("issued")? != 0,
            valid_until,
        }))
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{:02X}", b)).collect::<String>() + "..."
}

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("enrollment record not found")]
    NotFound,
    #[error(transparent)]
    Rejected(#[from] EnrollmentError),
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),
    #[error("already exists: {0}")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
