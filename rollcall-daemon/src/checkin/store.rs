//! Persistent check-in history.
//!
//! At most one row per (identity, session, calendar day), enforced by a
//! unique constraint. The first check-in of a day inserts; later ones only
//! move `last_checkin_at` forward.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

use super::CheckinStatus;
use crate::db::{decode_timestamp, encode_timestamp};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A day's check-in for one identity and session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinRecord {
    pub checkin_id: i64,
    pub identity_id: String,
    pub session_id: i64,
    pub day: NaiveDate,
    pub first_checkin_at: DateTime<Utc>,
    pub last_checkin_at: DateTime<Utc>,
    pub status: CheckinStatus,
}

/// Whether a check-in created the day's record or updated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinOutcome {
    Created(CheckinRecord),
    Updated(CheckinRecord),
}

impl CheckinOutcome {
    pub fn record(&self) -> &CheckinRecord {
        match self {
            Self::Created(record) | Self::Updated(record) => record,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Check-in storage.
#[derive(Clone)]
pub struct CheckinStore {
    pool: SqlitePool,
}

impl CheckinStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a check-in at `now` for `day`.
    ///
    /// `status` only applies when this call creates the day's record.
    /// A duplicate insert (same identity, session and day) is detected by
    /// the unique constraint and becomes an update, all in one transaction.
    pub async fn record(
        &self,
        identity_id: &str,
        session_id: i64,
        day: NaiveDate,
        now: DateTime<Utc>,
        status: CheckinStatus,
    ) -> Result<CheckinOutcome, sqlx::Error> {
        let day_str = day.format(DATE_FORMAT).to_string();
        let now_str = encode_timestamp(&now);

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO checkins
                (identity_id, session_id, checkin_date, first_checkin_at, last_checkin_at, status)
            VALUES (?1, ?2, ?3, ?4, ?4, ?5)
            ON CONFLICT(identity_id, session_id, checkin_date) DO NOTHING
            "#,
        )
        .bind(identity_id)
        .bind(session_id)
        .bind(&day_str)
        .bind(&now_str)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let created = inserted == 1;
        if !created {
            sqlx::query(
                r#"
                UPDATE checkins
                SET last_checkin_at = MAX(last_checkin_at, ?1)
                WHERE identity_id = ?2 AND session_id = ?3 AND checkin_date = ?4
                "#,
            )
            .bind(&now_str)
            .bind(identity_id)
            .bind(session_id)
            .bind(&day_str)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query(
            r#"
            SELECT checkin_id, identity_id, session_id, checkin_date,
                   first_checkin_at, last_checkin_at, status
            FROM checkins
            WHERE identity_id = ?1 AND session_id = ?2 AND checkin_date = ?3
            "#,
        )
        .bind(identity_id)
        .bind(session_id)
        .bind(&day_str)
        .fetch_one(&mut *tx)
        .await?;
        let record = parse_checkin_row(&row)?;

        tx.commit().await?;

        Ok(if created {
            CheckinOutcome::Created(record)
        } else {
            CheckinOutcome::Updated(record)
        })
    }

    /// Find the check-in for an identity, session and day.
    pub async fn find(
        &self,
        identity_id: &str,
        session_id: i64,
        day: NaiveDate,
    ) -> Result<Option<CheckinRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT checkin_id, identity_id, session_id, checkin_date,
                   first_checkin_at, last_checkin_at, status
            FROM checkins
            WHERE identity_id = ?1 AND session_id = ?2 AND checkin_date = ?3
            "#,
        )
        .bind(identity_id)
        .bind(session_id)
        .bind(day.format(DATE_FORMAT).to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(parse_checkin_row).transpose()
    }

    /// Count all check-in rows.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM checkins")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }
}

fn parse_checkin_row(row: &sqlx::sqlite::SqliteRow) -> Result<CheckinRecord, sqlx::Error> {
    let day_str: String = row.try_get("checkin_date")?;
    let day = NaiveDate::parse_from_str(&day_str, DATE_FORMAT)
        .map_err(|e| sqlx::Error::Decode(format!("Invalid checkin_date: {}", e).into()))?;

    let first: String = row.try_get("first_checkin_at")?;
    let last: String = row.try_get("last_checkin_at")?;

    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<CheckinStatus>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;

    Ok(CheckinRecord {
        checkin_id: row.try_get("checkin_id")?,
        identity_id: row.try_get("identity_id")?,
        session_id: row.try_get("session_id")?,
        day,
        first_checkin_at: decode_timestamp("first_checkin_at", &first)?,
        last_checkin_at: decode_timestamp("last_checkin_at", &last)?,
        status,
    })
}
