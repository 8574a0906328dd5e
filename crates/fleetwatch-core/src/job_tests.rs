use crate::job::{JobStateError, JobStatus, MailJobDraft, ReportFormat, ReportKind};
use crate::schedule::{Recurrence, ScheduleSpec};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 10)
        .expect("date")
        .and_hms_opt(12, 0, 0)
        .expect("time")
}

fn draft(schedule: ScheduleSpec) -> MailJobDraft {
    MailJobDraft {
        recipient: "ops@example.com".to_string(),
        report_name: ReportKind::OperatingRate,
        schedule,
        format: ReportFormat::Pdf,
        report_params: "{}".to_string(),
    }
}

fn tomorrow_at_nine() -> ScheduleSpec {
    ScheduleSpec::one_time(
        NaiveDate::from_ymd_opt(2026, 3, 11).expect("date"),
        NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
    )
}

#[test]
fn lifecycle_follows_scheduled_processing_terminal() {
    let processing = JobStatus::Scheduled
        .transition(JobStatus::Processing)
        .expect("start");

    assert_eq!(processing.transition(JobStatus::Completed), Ok(JobStatus::Completed));
    assert_eq!(processing.transition(JobStatus::Failed), Ok(JobStatus::Failed));
    assert_eq!(processing.transition(JobStatus::Scheduled), Ok(JobStatus::Scheduled));
}

#[test]
fn terminal_states_do_not_restart() {
    assert_eq!(
        JobStatus::Completed.transition(JobStatus::Processing),
        Err(JobStateError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Processing
        })
    );
    assert!(!JobStatus::Failed.can_transition(JobStatus::Scheduled));
    assert!(!JobStatus::Scheduled.can_transition(JobStatus::Completed));
}

#[test]
fn processing_job_rejects_edit_and_delete() {
    assert_eq!(
        JobStatus::Processing.ensure_editable(),
        Err(JobStateError::NotEditable(JobStatus::Processing))
    );
    assert_eq!(JobStatus::Processing.ensure_deletable(), Err(JobStateError::NotDeletable));
    assert_eq!(JobStatus::Scheduled.ensure_editable(), Ok(()));
    assert_eq!(JobStatus::Failed.ensure_deletable(), Ok(()));
    assert!(JobStatus::Completed.ensure_editable().is_err());
}

#[test]
fn draft_validation_checks_recipient_params_and_time() {
    assert_eq!(draft(tomorrow_at_nine()).validate(now()), Ok(()));

    let mut bad_recipient = draft(tomorrow_at_nine());
    bad_recipient.recipient = "nobody".to_string();
    assert!(bad_recipient.validate(now()).is_err());

    let mut bad_params = draft(tomorrow_at_nine());
    bad_params.report_params = "{not json".to_string();
    assert!(bad_params.validate(now()).is_err());

    let past = ScheduleSpec::one_time(
        NaiveDate::from_ymd_opt(2026, 3, 9).expect("date"),
        NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
    );
    assert!(draft(past).validate(now()).is_err());

    let recurring_from_past = ScheduleSpec::recurring(past.date, past.time, Recurrence::Daily);
    assert_eq!(draft(recurring_from_past).validate(now()), Ok(()));
}

#[test]
fn formats_and_reports_parse_from_text() {
    assert_eq!("xlsx".parse::<ReportFormat>(), Ok(ReportFormat::Excel));
    assert_eq!(ReportFormat::Excel.extension(), "xlsx");
    assert_eq!(ReportFormat::Csv.content_type(), "text/csv");
    assert_eq!("status-history".parse::<ReportKind>(), Ok(ReportKind::StatusHistory));
    assert!("alarms".parse::<ReportKind>().is_err());
    assert_eq!("processing".parse::<JobStatus>(), Ok(JobStatus::Processing));
}
