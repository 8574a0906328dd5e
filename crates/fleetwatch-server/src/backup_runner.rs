use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Utc, Weekday};
use fleetwatch_core::{run_with_retry, BackupPlan, CronSchedule, ReportingConfig, RetryPolicy};
use tracing::{error, info, warn};

use crate::db::{models::NotificationKind, Database};
use crate::scheduler::CronRegistry;

pub const RUN_SUCCEEDED: &str = "succeeded";
pub const RUN_FAILED: &str = "failed";

#[async_trait]
pub trait BackupExecutor: Send + Sync {
    /// Takes one backup of the controller and returns where it was written.
    async fn backup(&self, controller_id: i64) -> Result<PathBuf>;
}

/// Copies `<source_root>/<controller_id>/` into a timestamped folder under `backup_root`.
pub struct FsBackupExecutor {
    source_root: PathBuf,
    backup_root: PathBuf,
}

impl FsBackupExecutor {
    pub fn new(source_root: PathBuf, backup_root: PathBuf) -> Self {
        Self {
            source_root,
            backup_root,
        }
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<u64> {
    std::fs::create_dir_all(to).with_context(|| format!("failed to create {}", to.display()))?;
    let mut copied = 0;
    for entry in std::fs::read_dir(from).with_context(|| format!("failed to read {}", from.display()))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else {
            copied += std::fs::copy(entry.path(), &target)
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(copied)
}

#[async_trait]
impl BackupExecutor for FsBackupExecutor {
    async fn backup(&self, controller_id: i64) -> Result<PathBuf> {
        let source = self.source_root.join(controller_id.to_string());
        if !source.is_dir() {
            bail!("controller data directory {} does not exist", source.display());
        }
        let target = self
            .backup_root
            .join(controller_id.to_string())
            .join(Utc::now().format("%Y%m%d-%H%M%S").to_string());

        let dest = target.clone();
        let bytes = tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
            .await
            .context("backup copy task panicked")??;

        info!(controller_id, bytes, path = %target.display(), "backup written");
        Ok(target)
    }
}

struct SchedulerInner {
    db: Database,
    executor: Arc<dyn BackupExecutor>,
    registry: CronRegistry<(i64, Weekday)>,
    retry: RetryPolicy,
}

/// Weekly backup timers, one per (plan, weekday).
#[derive(Clone)]
pub struct BackupScheduler {
    inner: Arc<SchedulerInner>,
}

impl BackupScheduler {
    pub fn new(
        db: Database,
        executor: Arc<dyn BackupExecutor>,
        reporting: &ReportingConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                db,
                executor,
                registry: CronRegistry::new(reporting.fixed_offset()),
                retry,
            }),
        }
    }

    pub fn registry(&self) -> &CronRegistry<(i64, Weekday)> {
        &self.inner.registry
    }

    pub fn register_plan(&self, plan: &BackupPlan) -> Result<usize> {
        self.unregister_plan(plan.id);
        if !plan.enabled {
            return Ok(0);
        }

        let expressions = plan.cron_expressions();
        for (weekday, expression) in &expressions {
            let schedule = CronSchedule::parse(expression)
                .with_context(|| format!("invalid backup schedule for plan {}", plan.id))?;
            let scheduler = self.clone();
            let plan_id = plan.id;

            self.inner
                .registry
                .register((plan_id, *weekday), schedule, move || {
                    let scheduler = scheduler.clone();
                    async move {
                        if let Err(err) = scheduler.run_plan(plan_id).await {
                            error!(plan_id, error = %format!("{err:#}"), "backup run could not be recorded");
                        }
                    }
                });
        }
        Ok(expressions.len())
    }

    pub fn unregister_plan(&self, plan_id: i64) -> usize {
        let keys: Vec<_> = self
            .inner
            .registry
            .keys()
            .into_iter()
            .filter(|(id, _)| *id == plan_id)
            .collect();
        keys.iter()
            .filter(|key| self.inner.registry.cancel(key))
            .count()
    }

    pub async fn rebuild(&self) -> Result<usize> {
        let plans = self.inner.db.list_enabled_backup_plans().await?;
        let mut timers = 0;
        for plan in &plans {
            match self.register_plan(plan) {
                Ok(count) => timers += count,
                Err(err) => error!(plan_id = plan.id, error = %format!("{err:#}"), "failed to register backup plan"),
            }
        }
        info!(plans = plans.len(), timers, "backup timers rebuilt");
        Ok(timers)
    }

    /// Runs the plan with the retry policy and records one `backup_runs` row for the whole run.
    pub async fn run_plan(&self, plan_id: i64) -> Result<i64> {
        let db = &self.inner.db;
        let Some(plan) = db.get_backup_plan(plan_id).await? else {
            bail!("backup plan {plan_id} not found");
        };

        let started_at = Utc::now();
        info!(plan_id, controller_id = plan.controller_id, "backup started");

        let executor = self.inner.executor.clone();
        let outcome = run_with_retry(self.inner.retry, |attempt| {
            let executor = executor.clone();
            async move {
                if attempt > 1 {
                    info!(plan_id, attempt, "retrying backup");
                }
                executor
                    .backup(plan.controller_id)
                    .await
                    .map_err(|err| format!("{err:#}"))
            }
        })
        .await;

        match outcome.result {
            Ok(path) => {
                info!(plan_id, attempts = outcome.attempts, "backup succeeded");
                db.insert_backup_run(
                    plan_id,
                    started_at,
                    outcome.attempts,
                    RUN_SUCCEEDED,
                    Some(path.display().to_string()),
                )
                .await
            }
            Err(message) => {
                warn!(plan_id, attempts = outcome.attempts, error = %message, "backup abandoned after final attempt");
                let run_id = db
                    .insert_backup_run(plan_id, started_at, outcome.attempts, RUN_FAILED, Some(message.clone()))
                    .await?;
                if let Err(err) = db
                    .insert_notification(
                        NotificationKind::BackupFailed,
                        format!("Backup '{}' failed", plan.name),
                        format!("{} attempts failed: {message}", outcome.attempts),
                    )
                    .await
                {
                    error!(plan_id, error = %err, "failed to persist backup notification");
                }
                Ok(run_id)
            }
        }
    }

    pub fn shutdown(&self) {
        self.inner.registry.shutdown();
    }
}
