use chrono::{DateTime, NaiveTime, Utc};
use fleetwatch_core::ShiftWindow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controller {
    pub id: i64,
    pub name: String,
    pub model: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: i64,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}

impl Shift {
    pub fn window(&self) -> ShiftWindow {
        ShiftWindow::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MailJobFailed,
    ReportFailed,
    BackupFailed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::MailJobFailed => "mail_job_failed",
            NotificationKind::ReportFailed => "report_failed",
            NotificationKind::BackupFailed => "backup_failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mail_job_failed" => Some(NotificationKind::MailJobFailed),
            "report_failed" => Some(NotificationKind::ReportFailed),
            "backup_failed" => Some(NotificationKind::BackupFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRun {
    pub id: i64,
    pub plan_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempts: u32,
    pub status: String,
    pub message: Option<String>,
}
