use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::backup_runner::{BackupExecutor, BackupScheduler, FsBackupExecutor};
use crate::config::ServerConfig;
use crate::db::Database;
use crate::mail_runner::MailJobRunner;
use crate::mailer::{DisabledMailer, Mailer, SmtpMailer};
use crate::reports::ReportTasks;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServerConfig>,
    pub mail_jobs: MailJobRunner,
    pub backups: BackupScheduler,
    pub report_tasks: ReportTasks,
}

impl AppState {
    pub fn new(
        db: Database,
        config: ServerConfig,
        mailer: Arc<dyn Mailer>,
        executor: Arc<dyn BackupExecutor>,
    ) -> Self {
        let mail_jobs = MailJobRunner::new(
            db.clone(),
            mailer,
            config.reporting.clone(),
            config.report_dir.clone(),
        );
        let backups = BackupScheduler::new(db.clone(), executor, &config.reporting, config.backup.retry);

        Self {
            db,
            config: Arc::new(config),
            mail_jobs,
            backups,
            report_tasks: ReportTasks::new(),
        }
    }

    /// Opens the database and wires the production mailer and backup executor.
    pub fn open(config: ServerConfig) -> Result<Self> {
        let db = Database::new(config.database_path.clone())?;

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                warn!("no SMTP host configured, scheduled mails will fail");
                Arc::new(DisabledMailer)
            }
        };
        let executor = Arc::new(FsBackupExecutor::new(
            config.backup.source_root.clone(),
            config.backup.backup_root.clone(),
        ));

        Ok(Self::new(db, config, mailer, executor))
    }

    /// Registers the timers of every persisted job and plan.
    pub async fn start_schedulers(&self) -> Result<()> {
        let jobs = self.mail_jobs.rebuild().await?;
        let backups = self.backups.rebuild().await?;
        info!(mail_jobs = jobs, backup_timers = backups, "schedulers started");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.mail_jobs.shutdown();
        self.backups.shutdown();
    }
}
