//! Check-in status policies.
//!
//! The status of a day's check-in is decided once, when the first check-in
//! of the day is recorded.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveTime};

/// Status stored with a check-in record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinStatus {
    OnTime,
    Late,
}

impl CheckinStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "on time",
            Self::Late => "late",
        }
    }
}

impl fmt::Display for CheckinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckinStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on time" => Ok(Self::OnTime),
            "late" => Ok(Self::Late),
            other => Err(format!("unknown check-in status: {}", other)),
        }
    }
}

/// Decides the status of a first check-in.
pub trait StatusPolicy: Send + Sync {
    /// `local_time` is the check-in time of day in the configured timezone.
    fn status(&self, session_id: i64, local_time: NaiveTime) -> CheckinStatus;
}

/// Every check-in is on time.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnTime;

impl StatusPolicy for AlwaysOnTime {
    fn status(&self, _session_id: i64, _local_time: NaiveTime) -> CheckinStatus {
        CheckinStatus::OnTime
    }
}

/// Marks check-ins late once a session's start time plus grace has passed.
///
/// Sessions without a configured start time are always on time.
#[derive(Debug, Clone)]
pub struct SessionSchedule {
    starts: HashMap<i64, NaiveTime>,
    grace: Duration,
}

impl SessionSchedule {
    pub fn new(starts: HashMap<i64, NaiveTime>, grace: Duration) -> Self {
        Self { starts, grace }
    }
}

impl StatusPolicy for SessionSchedule {
    fn status(&self, session_id: i64, local_time: NaiveTime) -> CheckinStatus {
        let Some(start) = self.starts.get(&session_id) else {
            return CheckinStatus::OnTime;
        };

        // overflowing_add_signed wraps past midnight; a wrapped deadline
        // means the grace period runs to the end of the day.
        let (deadline, wrapped) = start.overflowing_add_signed(self.grace);
        if wrapped != 0 || local_time <= deadline {
            CheckinStatus::OnTime
        } else {
            CheckinStatus::Late
        }
    }
}
