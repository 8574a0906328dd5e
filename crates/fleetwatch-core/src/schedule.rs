use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("unknown recurrence pattern '{0}'")]
    UnknownRecurrence(String),
    #[error("cron expression '{0}' must have 5 fields")]
    FieldCount(String),
    #[error("invalid day-of-week '{0}'")]
    InvalidWeekday(String),
    #[error("invalid cron expression '{expr}': {reason}")]
    Invalid { expr: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }
}

impl FromStr for Recurrence {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            _ => Err(ScheduleError::UnknownRecurrence(value.to_string())),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock (local) schedule as entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSpec {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub recurrence: Option<Recurrence>,
}

impl ScheduleSpec {
    pub fn one_time(date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            date,
            time,
            recurrence: None,
        }
    }

    pub fn recurring(date: NaiveDate, time: NaiveTime, recurrence: Recurrence) -> Self {
        Self {
            date,
            time,
            recurrence: Some(recurrence),
        }
    }

    /// Standard five-field expression (`min hour dom month dow`, Sunday = 0).
    pub fn cron_expression(&self) -> String {
        let (minute, hour) = (self.time.minute(), self.time.hour());
        match self.recurrence {
            None => format!("{minute} {hour} {} {} *", self.date.day(), self.date.month()),
            Some(Recurrence::Daily) => format!("{minute} {hour} * * *"),
            Some(Recurrence::Weekly) => format!(
                "{minute} {hour} * * {}",
                self.date.weekday().num_days_from_sunday()
            ),
            Some(Recurrence::Monthly) => format!("{minute} {hour} {} * *", self.date.day()),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Local wall time the schedule first becomes due.
    pub fn first_due(&self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        self.date
            .and_time(self.time)
            .and_local_timezone(offset)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Parsed five-field cron expression evaluated in a fixed local offset.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    inner: Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(expression.to_string()));
        }

        let weekday = translate_weekday_field(fields[4])?;
        let extended = format!(
            "0 {} {} {} {} {}",
            fields[0], fields[1], fields[2], fields[3], weekday
        );

        let inner = Schedule::from_str(&extended).map_err(|err| ScheduleError::Invalid {
            expr: expression.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            expression: fields.join(" "),
            inner,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next_after(&self, after: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        self.inner
            .after(&after.with_timezone(&offset))
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn upcoming(&self, after: DateTime<Utc>, offset: FixedOffset, count: usize) -> Vec<DateTime<Utc>> {
        self.inner
            .after(&after.with_timezone(&offset))
            .take(count)
            .map(|dt| dt.with_timezone(&Utc))
            .collect()
    }
}

/// Numeric weekdays (0-7, Sunday = 0 or 7) become names so they do not depend on
/// the scheduler's own numbering.
fn translate_weekday_field(field: &str) -> Result<String, ScheduleError> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let translate_one = |token: &str| -> Result<String, ScheduleError> {
        match token.parse::<usize>() {
            Ok(n) if n <= 7 => Ok(WEEKDAY_NAMES[n % 7].to_string()),
            Ok(_) => Err(ScheduleError::InvalidWeekday(token.to_string())),
            Err(_) if WEEKDAY_NAMES.iter().any(|name| name.eq_ignore_ascii_case(token)) => {
                Ok(token.to_string())
            }
            Err(_) => Err(ScheduleError::InvalidWeekday(token.to_string())),
        }
    };

    field
        .split(',')
        .map(|item| match item.split_once('-') {
            Some((from, to)) => Ok(format!("{}-{}", translate_one(from)?, translate_one(to)?)),
            None => translate_one(item),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|items| items.join(","))
}
