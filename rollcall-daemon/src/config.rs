//! Daemon configuration values and their parsers.
//!
//! The parsers double as clap value parsers, so malformed flags and
//! environment variables are rejected before anything is opened.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveTime};

use crate::checkin::{AlwaysOnTime, SessionSchedule, StatusPolicy};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_VALIDITY: &str = "30d";
pub const DEFAULT_UTC_OFFSET: &str = "+00:00";
pub const DEFAULT_LATE_AFTER: &str = "10m";

/// Longest certificate validity accepted from configuration.
pub const MAX_VALIDITY_DAYS: i64 = 36_500;

const DATABASE_FILE: &str = "rollcall.db";
const AUTHORITY_KEY_FILE: &str = "authority_key.pem";

/// On-disk locations used by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub authority_key: PathBuf,
}

impl Paths {
    /// Resolve paths, filling unset ones from the data directory.
    ///
    /// The data directory defaults to `<local data dir>/rollcall`.
    pub fn resolve(
        data_dir: Option<PathBuf>,
        database: Option<PathBuf>,
        authority_key: Option<PathBuf>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        Self {
            database: database.unwrap_or_else(|| data_dir.join(DATABASE_FILE)),
            authority_key: authority_key.unwrap_or_else(|| data_dir.join(AUTHORITY_KEY_FILE)),
            data_dir,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rollcall")
}

/// Parse a duration like "90s", "15m", "12h" or "30d".
///
/// A bare number is seconds. Zero is rejected.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let (num_str, unit) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1),
        Some((i, 'm')) => (&s[..i], 60),
        Some((i, 'h')) => (&s[..i], 3600),
        Some((i, 'd')) => (&s[..i], 86_400),
        Some(_) => (s, 1),
        None => return Err(invalid()),
    };

    let num: i64 = num_str.parse().map_err(|_| invalid())?;
    let secs = num.checked_mul(unit).ok_or_else(invalid)?;
    if secs <= 0 {
        return Err(ConfigError::NonPositiveDuration(s.to_string()));
    }
    Duration::try_seconds(secs).ok_or_else(invalid)
}

/// Parse a certificate validity, capped at [`MAX_VALIDITY_DAYS`].
///
/// Keeps every issued expiry within the four-digit years the certificate
/// payload can carry.
pub fn parse_validity(s: &str) -> Result<Duration, ConfigError> {
    let validity = parse_duration(s)?;
    if validity > Duration::days(MAX_VALIDITY_DAYS) {
        return Err(ConfigError::ValidityTooLong(s.trim().to_string()));
    }
    Ok(validity)
}

/// Parse a UTC offset like "+00:00", "-05:30" or "Z".
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| ConfigError::InvalidOffset(s.to_string()));
    }
    s.parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidOffset(s.to_string()))
}

/// Parse a session start time of the form "<session>=<HH:MM>".
pub fn parse_session_start(s: &str) -> Result<(i64, NaiveTime), ConfigError> {
    let invalid = || ConfigError::InvalidSessionStart(s.to_string());

    let (session, time) = s.split_once('=').ok_or_else(invalid)?;
    let session: i64 = session.trim().parse().map_err(|_| invalid())?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| invalid())?;
    Ok((session, time))
}

/// Build the status policy for a set of session start times.
///
/// Without start times every check-in is on time.
pub fn status_policy(starts: &[(i64, NaiveTime)], late_after: Duration) -> Arc<dyn StatusPolicy> {
    if starts.is_empty() {
        return Arc::new(AlwaysOnTime);
    }
    let starts: HashMap<i64, NaiveTime> = starts.iter().copied().collect();
    Arc::new(SessionSchedule::new(starts, late_after))
}

/// Errors parsing configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid duration '{0}' (expected e.g. 90s, 15m, 12h, 30d)")]
    InvalidDuration(String),
    #[error("duration '{0}' must be greater than zero")]
    NonPositiveDuration(String),
    #[error("validity '{0}' exceeds the maximum of {max} days", max = MAX_VALIDITY_DAYS)]
    ValidityTooLong(String),
    #[error("invalid UTC offset '{0}' (expected e.g. +00:00, -05:30)")]
    InvalidOffset(String),
    #[error("invalid session start '{0}' (expected <session>=<HH:MM>)")]
    InvalidSessionStart(String),
}
