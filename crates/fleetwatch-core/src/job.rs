use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::{Recurrence, ScheduleSpec};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobStateError {
    #[error("job cannot move from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
    #[error("job is {0} and can no longer be edited")]
    NotEditable(JobStatus),
    #[error("job is processing and cannot be deleted")]
    NotDeletable,
    #[error("unknown job status '{0}'")]
    UnknownStatus(String),
    #[error("unknown report format '{0}'")]
    UnknownFormat(String),
    #[error("unknown report '{0}'")]
    UnknownReport(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Scheduled,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// `processing -> scheduled` is how a recurring job waits for its next trigger.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (JobStatus::Scheduled, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Scheduled)
        )
    }

    pub fn transition(self, to: JobStatus) -> Result<JobStatus, JobStateError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(JobStateError::InvalidTransition { from: self, to })
        }
    }

    pub fn ensure_editable(&self) -> Result<(), JobStateError> {
        match self {
            JobStatus::Scheduled => Ok(()),
            other => Err(JobStateError::NotEditable(*other)),
        }
    }

    pub fn ensure_deletable(&self) -> Result<(), JobStateError> {
        match self {
            JobStatus::Processing => Err(JobStateError::NotDeletable),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scheduled" => Ok(JobStatus::Scheduled),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(JobStateError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Excel,
    Csv,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "excel",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "xlsx",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ReportFormat::Csv => "text/csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = JobStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "excel" | "xlsx" => Ok(ReportFormat::Excel),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(JobStateError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// Category minutes and operating rate for every controller.
    OperatingRate,
    /// Raw snapshots of one controller with their category.
    StatusHistory,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::OperatingRate => "operating-rate",
            ReportKind::StatusHistory => "status-history",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::OperatingRate => "Operating Rate Report",
            ReportKind::StatusHistory => "Status History Report",
        }
    }
}

impl FromStr for ReportKind {
    type Err = JobStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "operating-rate" => Ok(ReportKind::OperatingRate),
            "status-history" => Ok(ReportKind::StatusHistory),
            other => Err(JobStateError::UnknownReport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailJob {
    pub id: i64,
    pub recipient: String,
    pub report_name: ReportKind,
    pub schedule_date: NaiveDate,
    pub schedule_time: NaiveTime,
    pub is_recurring: bool,
    pub recurrence: Option<Recurrence>,
    pub format: ReportFormat,
    pub status: JobStatus,
    pub report_params: String,
    pub cron_expression: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MailJob {
    pub fn schedule(&self) -> ScheduleSpec {
        ScheduleSpec {
            date: self.schedule_date,
            time: self.schedule_time,
            recurrence: if self.is_recurring { self.recurrence } else { None },
        }
    }
}

/// Validated create/edit payload for a mail job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailJobDraft {
    pub recipient: String,
    pub report_name: ReportKind,
    pub schedule: ScheduleSpec,
    pub format: ReportFormat,
    pub report_params: String,
}

impl MailJobDraft {
    pub fn validate(&self, now_local: chrono::NaiveDateTime) -> Result<(), JobStateError> {
        let recipient = self.recipient.trim();
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(JobStateError::Invalid(format!(
                "invalid recipient email '{}'",
                self.recipient
            )));
        }

        if serde_json::from_str::<serde_json::Value>(&self.report_params).is_err() {
            return Err(JobStateError::Invalid(
                "report parameters must be valid JSON".to_string(),
            ));
        }

        if !self.schedule.is_recurring() && self.schedule.date.and_time(self.schedule.time) <= now_local {
            return Err(JobStateError::Invalid(
                "one-time schedule must be in the future".to_string(),
            ));
        }

        Ok(())
    }
}
