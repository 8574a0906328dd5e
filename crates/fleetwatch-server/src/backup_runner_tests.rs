use std::fs;
use std::sync::Arc;

use chrono::{NaiveTime, Weekday};
use fleetwatch_core::{BackupPlan, ReportingConfig, RetryPolicy};

use crate::backup_runner::{BackupExecutor, BackupScheduler, FsBackupExecutor, RUN_FAILED, RUN_SUCCEEDED};
use crate::db::{models::NotificationKind, Database};
use crate::test_support::{make_temp_dir, temp_db, FlakyExecutor};

async fn seed_plan(db: &Database, weekdays: Vec<Weekday>) -> BackupPlan {
    let controller = db
        .create_controller("R-10".to_string(), None, None)
        .await
        .expect("controller");
    db.create_backup_plan(
        controller.id,
        "weekly".to_string(),
        weekdays,
        NaiveTime::from_hms_opt(2, 0, 0).expect("time"),
    )
    .await
    .expect("plan")
}

fn scheduler(db: &Database, executor: Arc<FlakyExecutor>) -> BackupScheduler {
    BackupScheduler::new(db.clone(), executor, &ReportingConfig::default(), RetryPolicy::default())
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    // Arrange
    let (db, dir) = temp_db("backup-retry-ok");
    let plan = seed_plan(&db, vec![Weekday::Mon]).await;
    let executor = FlakyExecutor::new(2);
    let backups = scheduler(&db, executor.clone());

    // Act
    backups.run_plan(plan.id).await.expect("run");

    // Assert
    let runs = db.list_backup_runs(plan.id).await.expect("runs");
    assert_eq!(executor.calls(), 3);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RUN_SUCCEEDED);
    assert_eq!(runs[0].attempts, 3);
    assert!(db.list_notifications(false).await.expect("notifications").is_empty());

    drop(backups);
    drop(db);
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_three_retries_and_notifies() {
    // Arrange
    let (db, dir) = temp_db("backup-retry-fail");
    let plan = seed_plan(&db, vec![Weekday::Mon]).await;
    let executor = FlakyExecutor::new(u32::MAX);
    let backups = scheduler(&db, executor.clone());

    // Act
    backups.run_plan(plan.id).await.expect("run");

    // Assert
    assert_eq!(executor.calls(), 4, "one attempt plus three retries");
    let runs = db.list_backup_runs(plan.id).await.expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RUN_FAILED);
    assert_eq!(runs[0].attempts, 4);
    assert!(runs[0]
        .message
        .as_deref()
        .unwrap_or_default()
        .contains("unreachable"));

    let notifications = db.list_notifications(false).await.expect("notifications");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::BackupFailed);

    drop(backups);
    drop(db);
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn one_timer_per_weekday_and_unregister_removes_all() {
    // Arrange
    let (db, dir) = temp_db("backup-timers");
    let plan = seed_plan(&db, vec![Weekday::Sun, Weekday::Wed, Weekday::Sat]).await;
    let backups = scheduler(&db, FlakyExecutor::new(0));

    // Act
    let registered = backups.register_plan(&plan).expect("register");
    let sunday = backups.registry().expression(&(plan.id, Weekday::Sun));
    let removed = backups.unregister_plan(plan.id);

    // Assert
    assert_eq!(registered, 3);
    assert_eq!(sunday.as_deref(), Some("0 2 * * 0"));
    assert_eq!(removed, 3);
    assert!(backups.registry().is_empty());

    drop(backups);
    drop(db);
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn rebuild_registers_enabled_plans() {
    // Arrange
    let (db, dir) = temp_db("backup-rebuild");
    let plan = seed_plan(&db, vec![Weekday::Tue, Weekday::Fri]).await;
    let backups = scheduler(&db, FlakyExecutor::new(0));

    // Act
    let timers = backups.rebuild().await.expect("rebuild");

    // Assert
    assert_eq!(timers, 2);
    assert!(backups.registry().contains(&(plan.id, Weekday::Fri)));

    backups.shutdown();
    drop(backups);
    drop(db);
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn filesystem_executor_copies_controller_tree() {
    // Arrange
    let dir = make_temp_dir("fs-backup");
    let source = dir.join("source");
    fs::create_dir_all(source.join("12").join("jobs")).expect("mkdir");
    fs::write(source.join("12").join("ALL.PRM"), "params").expect("write");
    fs::write(source.join("12").join("jobs").join("WELD.JBI"), "job").expect("write");
    let executor = FsBackupExecutor::new(source, dir.join("backups"));

    // Act
    let target = executor.backup(12).await.expect("backup");
    let missing = executor.backup(99).await;

    // Assert
    assert!(target.starts_with(dir.join("backups").join("12")));
    assert_eq!(fs::read_to_string(target.join("ALL.PRM")).expect("read"), "params");
    assert_eq!(
        fs::read_to_string(target.join("jobs").join("WELD.JBI")).expect("read"),
        "job"
    );
    assert!(missing.is_err());

    let _ = fs::remove_dir_all(dir);
}
