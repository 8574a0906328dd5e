use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Offset used when stored UTC timestamps are bucketed into local hours and days.
pub const DEFAULT_LOCAL_OFFSET_HOURS: i32 = 3;

#[derive(Debug, Clone)]
pub struct ReportingConfig {
    pub local_offset_hours: i32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            local_offset_hours: DEFAULT_LOCAL_OFFSET_HOURS,
        }
    }
}

impl ReportingConfig {
    pub fn new(local_offset_hours: i32) -> Self {
        Self { local_offset_hours }
    }

    pub fn offset(&self) -> ChronoDuration {
        ChronoDuration::hours(self.local_offset_hours as i64)
    }

    pub fn offset_minutes(&self) -> i64 {
        self.local_offset_hours as i64 * 60
    }

    /// Falls back to UTC when the configured hours are outside +/-23.
    pub fn fixed_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.local_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    /// SQLite date-function modifier that shifts a UTC column into local time.
    pub fn sqlite_modifier(&self) -> String {
        format!("{:+} minutes", self.offset_minutes())
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.naive_utc() + self.offset()
    }

    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.to_local(now).date()
    }
}
