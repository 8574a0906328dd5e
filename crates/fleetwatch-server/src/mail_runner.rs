use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use fleetwatch_core::{CronSchedule, JobStateError, MailJob, MailJobDraft, ReportingConfig, ScheduleError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::{models::NotificationKind, Database, MailJobUpdate, RunCompletion};
use crate::mailer::{MailAttachment, Mailer, OutgoingMail};
use crate::reports::{self, render_blocking, ReportError, ReportParams};
use crate::scheduler::CronRegistry;

#[derive(Debug, Error)]
pub enum MailJobError {
    #[error("mail job {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    State(#[from] JobStateError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Params(#[from] ReportError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

struct RunnerInner {
    db: Database,
    mailer: Arc<dyn Mailer>,
    registry: CronRegistry<i64>,
    reporting: ReportingConfig,
    report_dir: PathBuf,
}

/// Owns the timers of scheduled report mails and runs them when they fire.
#[derive(Clone)]
pub struct MailJobRunner {
    inner: Arc<RunnerInner>,
}

impl MailJobRunner {
    pub fn new(
        db: Database,
        mailer: Arc<dyn Mailer>,
        reporting: ReportingConfig,
        report_dir: PathBuf,
    ) -> Self {
        let registry = CronRegistry::new(reporting.fixed_offset());
        Self {
            inner: Arc::new(RunnerInner {
                db,
                mailer,
                registry,
                reporting,
                report_dir,
            }),
        }
    }

    pub fn registry(&self) -> &CronRegistry<i64> {
        &self.inner.registry
    }

    /// Re-registers every persisted `scheduled` job. One-time jobs whose moment passed
    /// while the service was down run right away.
    pub async fn rebuild(&self) -> Result<usize> {
        self.fail_interrupted().await?;

        let jobs = self.inner.db.list_scheduled_mail_jobs().await?;
        let now = Utc::now();
        let offset = self.inner.reporting.fixed_offset();
        let mut registered = 0;

        for job in jobs {
            let schedule = job.schedule();
            let missed = !schedule.is_recurring()
                && schedule.first_due(offset).map(|due| due <= now).unwrap_or(false);

            if missed {
                warn!(job_id = job.id, "one-time mail job missed its schedule, running now");
                let runner = self.clone();
                let job_id = job.id;
                tokio::spawn(async move {
                    if let Err(err) = runner.execute(job_id).await {
                        error!(job_id, error = %format!("{err:#}"), "catch-up run failed");
                    }
                });
                continue;
            }

            match self.register(&job) {
                Ok(()) => registered += 1,
                Err(err) => error!(job_id = job.id, error = %err, "failed to register mail job"),
            }
        }

        info!(registered, "mail job timers rebuilt");
        Ok(registered)
    }

    /// A run that was cut short never reached `finish_mail_job_run`, so its job would
    /// stay `processing` and be locked against edits and deletion.
    async fn fail_interrupted(&self) -> Result<()> {
        for job in self.inner.db.list_processing_mail_jobs().await? {
            let message = "run interrupted before completion".to_string();
            warn!(job_id = job.id, "mail job was left processing, marking it failed");
            self.inner
                .db
                .finish_mail_job_run(job.id, RunCompletion::Failed(message.clone()))
                .await?;
            self.notify_failure(&job, &message).await;
        }
        Ok(())
    }

    fn register(&self, job: &MailJob) -> Result<(), ScheduleError> {
        let schedule = CronSchedule::parse(&job.cron_expression)?;
        let runner = self.clone();
        let job_id = job.id;

        self.inner.registry.register(job_id, schedule, move || {
            let runner = runner.clone();
            async move {
                if let Err(err) = runner.execute(job_id).await {
                    error!(job_id, error = %format!("{err:#}"), "mail job run failed");
                }
            }
        });
        Ok(())
    }

    fn validate(&self, draft: &MailJobDraft) -> Result<(), MailJobError> {
        draft.validate(self.inner.reporting.to_local(Utc::now()))?;
        CronSchedule::parse(&draft.schedule.cron_expression())?;
        ReportParams::from_json(&draft.report_params)?.check(draft.report_name)?;
        Ok(())
    }

    pub async fn create(&self, draft: MailJobDraft) -> Result<MailJob, MailJobError> {
        self.validate(&draft)?;
        let job = self.inner.db.insert_mail_job(draft).await?;
        self.register(&job)?;
        info!(job_id = job.id, cron = %job.cron_expression, "mail job scheduled");
        Ok(job)
    }

    /// Only `scheduled` jobs can be edited; the timer is replaced with the new schedule.
    pub async fn update(&self, job_id: i64, draft: MailJobDraft) -> Result<MailJob, MailJobError> {
        self.validate(&draft)?;
        match self.inner.db.update_mail_job(job_id, draft).await? {
            MailJobUpdate::Applied(job) => {
                self.inner.registry.cancel(&job_id);
                self.register(&job)?;
                info!(job_id, cron = %job.cron_expression, "mail job rescheduled");
                Ok(job)
            }
            MailJobUpdate::NotFound => Err(MailJobError::NotFound(job_id)),
            MailJobUpdate::Rejected(err) => Err(err.into()),
        }
    }

    pub async fn delete(&self, job_id: i64) -> Result<MailJob, MailJobError> {
        match self.inner.db.delete_mail_job(job_id).await? {
            MailJobUpdate::Applied(job) => {
                self.inner.registry.cancel(&job_id);
                info!(job_id, "mail job deleted");
                Ok(job)
            }
            MailJobUpdate::NotFound => Err(MailJobError::NotFound(job_id)),
            MailJobUpdate::Rejected(err) => Err(err.into()),
        }
    }

    /// Runs one trigger. Returns `None` when the job was not in `scheduled` state,
    /// so a trigger never runs a job twice. Once claimed, the job always leaves
    /// `processing`, as `failed` if any step errors.
    pub async fn execute(&self, job_id: i64) -> Result<Option<MailJob>> {
        let db = &self.inner.db;
        if !db.try_mark_processing(job_id).await? {
            warn!(job_id, "trigger skipped, job is not scheduled");
            return Ok(None);
        }

        let job = match db.get_mail_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Err(anyhow!("mail job {job_id} disappeared while processing")),
            Err(err) => {
                let message = format!("failed to load job: {err:#}");
                self.fail_run(job_id, &message).await?;
                return Err(err);
            }
        };
        info!(job_id, report = job.report_name.as_str(), format = job.format.as_str(), "mail job processing");

        let outcome = match self.deliver(&job).await {
            Ok(()) => {
                let completion = if job.is_recurring {
                    RunCompletion::Rescheduled
                } else {
                    RunCompletion::Completed
                };
                db.finish_mail_job_run(job_id, completion)
                    .await
                    .context("failed to record delivered run")
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(updated) => {
                if !job.is_recurring {
                    self.inner.registry.cancel(&job_id);
                }
                info!(job_id, status = %updated.status, "mail job delivered");
                Ok(Some(updated))
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(job_id, error = %message, "mail job failed");
                let updated = self.fail_run(job_id, &message).await?;
                self.notify_failure(&job, &message).await;
                Ok(Some(updated))
            }
        }
    }

    async fn fail_run(&self, job_id: i64, message: &str) -> Result<MailJob> {
        self.inner.registry.cancel(&job_id);
        self.inner
            .db
            .finish_mail_job_run(job_id, RunCompletion::Failed(message.to_string()))
            .await
            .with_context(|| format!("failed to mark mail job {job_id} failed"))
    }

    async fn deliver(&self, job: &MailJob) -> Result<()> {
        let params = ReportParams::from_json(&job.report_params)?;
        let table = reports::collect(
            &self.inner.db,
            job.report_name,
            &params,
            &self.inner.reporting,
            Utc::now(),
        )
        .await?;

        let rendered = render_blocking(table, job.format, self.inner.report_dir.clone()).await?;

        let sent = async {
            let bytes = tokio::fs::read(&rendered.path)
                .await
                .with_context(|| format!("failed to read {}", rendered.path.display()))?;
            self.inner
                .mailer
                .send(OutgoingMail {
                    to: job.recipient.clone(),
                    subject: format!("{} ({})", job.report_name.title(), Utc::now().format("%Y-%m-%d")),
                    body: format!(
                        "Attached is the scheduled {} report.",
                        job.report_name.as_str()
                    ),
                    attachment: Some(MailAttachment {
                        filename: rendered.filename.clone(),
                        content_type: rendered.content_type.to_string(),
                        bytes,
                    }),
                })
                .await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        rendered.remove();
        sent
    }

    async fn notify_failure(&self, job: &MailJob, message: &str) {
        let title = format!("Scheduled mail #{} failed", job.id);
        if let Err(err) = self
            .inner
            .db
            .insert_notification(NotificationKind::MailJobFailed, title.clone(), message.to_string())
            .await
        {
            error!(job_id = job.id, error = %err, "failed to persist failure notification");
        }

        let notice = OutgoingMail {
            to: job.recipient.clone(),
            subject: title,
            body: format!(
                "The scheduled {} report could not be delivered: {message}",
                job.report_name.as_str()
            ),
            attachment: None,
        };
        if let Err(err) = self.inner.mailer.send(notice).await {
            warn!(job_id = job.id, error = %err, "failure notice not sent");
        }
    }

    pub fn shutdown(&self) {
        self.inner.registry.shutdown();
    }
}
