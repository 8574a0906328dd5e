use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ReportingConfig;

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid time '{0}', expected HH:MM or HH:MM:SS")]
    InvalidTime(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("days must be a positive integer, got '{0}'")]
    InvalidDays(String),
    #[error("date range out of bounds")]
    OutOfRange,
}

pub fn parse_time(value: &str) -> Result<NaiveTime, WindowError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| WindowError::InvalidTime(value.to_string()))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, WindowError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| WindowError::InvalidDate(value.to_string()))
}

pub fn parse_days(value: &str) -> Result<u32, WindowError> {
    match value.trim().parse::<u32>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(WindowError::InvalidDays(value.to_string())),
    }
}

/// SQL fragment with named parameters, ready to be AND-ed into a WHERE clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlPredicate {
    pub clause: String,
    pub params: Vec<(&'static str, String)>,
}

/// Recurring wall-clock window a shift covers each day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ShiftWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        Ok(Self::new(parse_time(start)?, parse_time(end)?))
    }

    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// A window whose start equals its end covers the whole day.
    pub fn is_full_day(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, local_time: NaiveTime) -> bool {
        if self.is_full_day() {
            true
        } else if self.crosses_midnight() {
            local_time >= self.start || local_time <= self.end
        } else {
            local_time >= self.start && local_time <= self.end
        }
    }

    /// `local_time_expr` must evaluate to `HH:MM:SS` text, e.g. SQLite's `time(...)`.
    pub fn sql_predicate(&self, local_time_expr: &str) -> SqlPredicate {
        if self.is_full_day() {
            return SqlPredicate {
                clause: "1 = 1".to_string(),
                params: Vec::new(),
            };
        }

        let joiner = if self.crosses_midnight() { "OR" } else { "AND" };
        SqlPredicate {
            clause: format!(
                "({local_time_expr} >= :shift_start {joiner} {local_time_expr} <= :shift_end)"
            ),
            params: vec![
                (":shift_start", self.start.format(TIME_FORMAT).to_string()),
                (":shift_end", self.end.format(TIME_FORMAT).to_string()),
            ],
        }
    }
}

/// Resolved reporting range: inclusive local days, their UTC bounds, and an optional shift filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportWindow {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub shift: Option<ShiftWindow>,
}

impl ReportWindow {
    /// Covers `days` local days ending on `date` (default `today`), 00:00:00 through 23:59:59.
    pub fn resolve(
        date: Option<NaiveDate>,
        days: Option<u32>,
        shift: Option<ShiftWindow>,
        today: NaiveDate,
        config: &ReportingConfig,
    ) -> Result<Self, WindowError> {
        let last_day = date.unwrap_or(today);
        let days = days.unwrap_or(1);
        if days == 0 {
            return Err(WindowError::InvalidDays(days.to_string()));
        }
        let first_day = last_day
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or(WindowError::OutOfRange)?;

        let day_start = NaiveTime::from_hms_opt(0, 0, 0).ok_or(WindowError::OutOfRange)?;
        let day_end = NaiveTime::from_hms_opt(23, 59, 59).ok_or(WindowError::OutOfRange)?;
        let offset = config.offset();

        let start_utc = first_day
            .and_time(day_start)
            .checked_sub_signed(offset)
            .ok_or(WindowError::OutOfRange)?
            .and_utc();
        let end_utc = last_day
            .and_time(day_end)
            .checked_sub_signed(offset)
            .ok_or(WindowError::OutOfRange)?
            .and_utc();

        Ok(Self {
            first_day,
            last_day,
            start_utc,
            end_utc,
            shift,
        })
    }

    /// Applies the day range and shift filter to a UTC instant in memory.
    pub fn contains(&self, instant: DateTime<Utc>, config: &ReportingConfig) -> bool {
        if instant < self.start_utc || instant > self.end_utc {
            return false;
        }
        match self.shift {
            Some(shift) => shift.contains(config.to_local(instant).time()),
            None => true,
        }
    }
}
