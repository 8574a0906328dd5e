use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use fleetwatch_core::{JobStateError, JobStatus, MailJob, MailJobDraft, Recurrence};
use rusqlite::{params, Connection, Row};

use super::{
    helpers::{format_time, format_ts, parse_date, parse_optional_ts, parse_time, parse_ts},
    Database,
};

const SELECT_COLUMNS: &str = "SELECT id, recipient, report_name, schedule_date, schedule_time,
        is_recurring, recurrence, format, status, report_params, cron_expression,
        last_run_at, last_error, created_at, updated_at
     FROM mail_jobs";

/// Result of an edit or delete that is guarded by the job's current status.
#[derive(Debug)]
pub enum MailJobUpdate {
    Applied(MailJob),
    NotFound,
    Rejected(JobStateError),
}

/// How a triggered run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunCompletion {
    Completed,
    /// Recurring job that goes back to waiting for its next trigger.
    Rescheduled,
    Failed(String),
}

fn row_to_mail_job(row: &Row) -> Result<MailJob> {
    let report_name: String = row.get("report_name")?;
    let schedule_date: String = row.get("schedule_date")?;
    let schedule_time: String = row.get("schedule_time")?;
    let recurrence: Option<String> = row.get("recurrence")?;
    let format: String = row.get("format")?;
    let status: String = row.get("status")?;
    let last_run_at: Option<String> = row.get("last_run_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(MailJob {
        id: row.get("id")?,
        recipient: row.get("recipient")?,
        report_name: report_name.parse()?,
        schedule_date: parse_date(&schedule_date, "schedule_date")?,
        schedule_time: parse_time(&schedule_time, "schedule_time")?,
        is_recurring: row.get("is_recurring")?,
        recurrence: recurrence
            .map(|value| value.parse::<Recurrence>())
            .transpose()?,
        format: format.parse()?,
        status: status.parse()?,
        report_params: row.get("report_params")?,
        cron_expression: row.get("cron_expression")?,
        last_run_at: parse_optional_ts(last_run_at, "last_run_at")?,
        last_error: row.get("last_error")?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn load_mail_job(conn: &Connection, job_id: i64) -> Result<Option<MailJob>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
    let mut rows = stmt.query(params![job_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_mail_job(row)?)),
        None => Ok(None),
    }
}

fn load_many(conn: &Connection, filter: &str) -> Result<Vec<MailJob>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {filter} ORDER BY id ASC"))?;
    let mut rows = stmt.query([])?;
    let mut jobs = Vec::new();
    while let Some(row) = rows.next()? {
        jobs.push(row_to_mail_job(row)?);
    }
    Ok(jobs)
}

impl Database {
    pub async fn insert_mail_job(&self, draft: MailJobDraft) -> Result<MailJob> {
        self.execute(move |conn| {
            let now = format_ts(Utc::now());
            let schedule = draft.schedule;
            conn.execute(
                "INSERT INTO mail_jobs
                    (recipient, report_name, schedule_date, schedule_time, is_recurring, recurrence,
                     format, status, report_params, cron_expression, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    draft.recipient.trim(),
                    draft.report_name.as_str(),
                    schedule.date.format("%Y-%m-%d").to_string(),
                    format_time(schedule.time),
                    schedule.is_recurring(),
                    schedule.recurrence.map(|r| r.as_str()),
                    draft.format.as_str(),
                    JobStatus::Scheduled.as_str(),
                    draft.report_params,
                    schedule.cron_expression(),
                    now,
                ],
            )?;

            let id = conn.last_insert_rowid();
            load_mail_job(conn, id)?.ok_or_else(|| anyhow!("mail job {id} not found after insert"))
        })
        .await
    }

    pub async fn get_mail_job(&self, job_id: i64) -> Result<Option<MailJob>> {
        self.execute(move |conn| load_mail_job(conn, job_id)).await
    }

    pub async fn list_mail_jobs(&self) -> Result<Vec<MailJob>> {
        self.execute(|conn| load_many(conn, "")).await
    }

    pub async fn list_scheduled_mail_jobs(&self) -> Result<Vec<MailJob>> {
        self.execute(|conn| load_many(conn, "WHERE status = 'scheduled'"))
            .await
    }

    /// Jobs left in `processing` by a run that never finished, e.g. across a restart.
    pub async fn list_processing_mail_jobs(&self) -> Result<Vec<MailJob>> {
        self.execute(|conn| load_many(conn, "WHERE status = 'processing'"))
            .await
    }

    /// Replaces the schedule and payload of a job that is still waiting for its trigger.
    pub async fn update_mail_job(&self, job_id: i64, draft: MailJobDraft) -> Result<MailJobUpdate> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let Some(current) = load_mail_job(&tx, job_id)? else {
                return Ok(MailJobUpdate::NotFound);
            };
            if let Err(err) = current.status.ensure_editable() {
                return Ok(MailJobUpdate::Rejected(err));
            }

            let schedule = draft.schedule;
            tx.execute(
                "UPDATE mail_jobs
                 SET recipient = ?1, report_name = ?2, schedule_date = ?3, schedule_time = ?4,
                     is_recurring = ?5, recurrence = ?6, format = ?7, report_params = ?8,
                     cron_expression = ?9, updated_at = ?10
                 WHERE id = ?11",
                params![
                    draft.recipient.trim(),
                    draft.report_name.as_str(),
                    schedule.date.format("%Y-%m-%d").to_string(),
                    format_time(schedule.time),
                    schedule.is_recurring(),
                    schedule.recurrence.map(|r| r.as_str()),
                    draft.format.as_str(),
                    draft.report_params,
                    schedule.cron_expression(),
                    format_ts(Utc::now()),
                    job_id,
                ],
            )?;

            let updated = load_mail_job(&tx, job_id)?
                .ok_or_else(|| anyhow!("mail job {job_id} vanished during update"))?;
            tx.commit().context("failed to commit mail job update")?;
            Ok(MailJobUpdate::Applied(updated))
        })
        .await
    }

    pub async fn delete_mail_job(&self, job_id: i64) -> Result<MailJobUpdate> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let Some(current) = load_mail_job(&tx, job_id)? else {
                return Ok(MailJobUpdate::NotFound);
            };
            if let Err(err) = current.status.ensure_deletable() {
                return Ok(MailJobUpdate::Rejected(err));
            }

            tx.execute("DELETE FROM mail_jobs WHERE id = ?1", params![job_id])?;
            tx.commit().context("failed to commit mail job delete")?;
            Ok(MailJobUpdate::Applied(current))
        })
        .await
    }

    /// Compare-and-set `scheduled -> processing`. Returns false when another trigger
    /// already claimed the job or it is no longer scheduled.
    pub async fn try_mark_processing(&self, job_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE mail_jobs SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                params![
                    JobStatus::Processing.as_str(),
                    format_ts(Utc::now()),
                    job_id,
                    JobStatus::Scheduled.as_str(),
                ],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    pub async fn finish_mail_job_run(&self, job_id: i64, completion: RunCompletion) -> Result<MailJob> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let current = load_mail_job(&tx, job_id)?
                .ok_or_else(|| anyhow!("mail job {job_id} not found"))?;

            let (target, last_error) = match &completion {
                RunCompletion::Completed => (JobStatus::Completed, None),
                RunCompletion::Rescheduled => (JobStatus::Scheduled, None),
                RunCompletion::Failed(message) => (JobStatus::Failed, Some(message.clone())),
            };
            let next = current.status.transition(target)?;

            let now = format_ts(Utc::now());
            tx.execute(
                "UPDATE mail_jobs SET status = ?1, last_run_at = ?2, last_error = ?3, updated_at = ?2
                 WHERE id = ?4",
                params![next.as_str(), now, last_error, job_id],
            )?;

            let updated = load_mail_job(&tx, job_id)?
                .ok_or_else(|| anyhow!("mail job {job_id} vanished during update"))?;
            tx.commit().context("failed to commit mail job completion")?;
            Ok(updated)
        })
        .await
    }
}
