pub mod aggregator;
pub mod backup;
pub mod config;
pub mod job;
pub mod schedule;
pub mod shift;
pub mod snapshot;

#[cfg(test)]
mod aggregator_tests;
#[cfg(test)]
mod job_tests;
#[cfg(test)]
mod shift_tests;
#[cfg(test)]
mod snapshot_tests;

pub use aggregator::{CategoryDurations, DailyBreakdown, HourlyBreakdown, StatusAggregator, StatusHistory};
pub use backup::{run_with_retry, BackupPlan, RetryOutcome, RetryPolicy};
pub use config::ReportingConfig;
pub use job::{JobStateError, JobStatus, MailJob, MailJobDraft, ReportFormat, ReportKind};
pub use schedule::{CronSchedule, Recurrence, ScheduleError, ScheduleSpec};
pub use shift::{ReportWindow, ShiftWindow, SqlPredicate, WindowError};
pub use snapshot::{StatusCategory, StatusFlags, StatusSnapshot, CLASSIFICATION_RULES};
