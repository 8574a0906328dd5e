use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamps are stored as UTC text so SQLite date functions and string order agree.
pub fn format_ts(value: DateTime<Utc>) -> String {
    value.format(TS_FORMAT).to_string()
}

pub fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|err| anyhow!("invalid timestamp '{value}': {err}"))
}

pub fn parse_optional_ts(value: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_ts(&raw).with_context(|| format!("failed to parse {field}")).map(Some),
        None => Ok(None),
    }
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| format!("failed to parse {field}"))
}

pub fn parse_time(value: &str, field: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S").with_context(|| format!("failed to parse {field}"))
}

pub fn format_time(value: NaiveTime) -> String {
    value.format("%H:%M:%S").to_string()
}
