use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fleetwatch_core::{ReportingConfig, RetryPolicy, StatusFlags, StatusSnapshot};

use crate::backup_runner::BackupExecutor;
use crate::config::{BackupConfig, ServerConfig};
use crate::db::Database;
use crate::mailer::{MailError, Mailer, OutgoingMail};
use crate::state::AppState;

pub fn make_temp_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let uniq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("unix epoch")
        .as_nanos();
    path.push(format!("fleetwatch-tests-{name}-{uniq}"));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

pub fn temp_db(name: &str) -> (Database, PathBuf) {
    let dir = make_temp_dir(name);
    let db = Database::new(dir.join("fleetwatch.db")).expect("open test database");
    (db, dir)
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s)
        .single()
        .expect("valid timestamp")
}

pub fn running() -> StatusFlags {
    StatusFlags {
        connected: true,
        servo_on: true,
        operating: true,
        ..StatusFlags::default()
    }
}

pub fn idle() -> StatusFlags {
    StatusFlags {
        connected: true,
        servo_on: true,
        ..StatusFlags::default()
    }
}

pub fn snapshot(controller_id: i64, at: DateTime<Utc>, flags: StatusFlags) -> StatusSnapshot {
    StatusSnapshot {
        controller_id,
        recorded_at: at,
        flags,
    }
}

/// Keeps every mail it is handed; optionally refuses them all.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().expect("mailer lock").push(mail);
        if self.fail {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Fails the first `failures` calls, then succeeds.
pub struct FlakyExecutor {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyExecutor {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackupExecutor for FlakyExecutor {
    async fn backup(&self, controller_id: i64) -> Result<PathBuf> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            bail!("share for controller {controller_id} unreachable");
        }
        Ok(PathBuf::from(format!("/backups/{controller_id}/{call}")))
    }
}

pub fn test_config(dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        database_path: dir.join("fleetwatch.db"),
        report_dir: dir.join("reports"),
        reporting: ReportingConfig::default(),
        backup: BackupConfig {
            source_root: dir.join("controllers"),
            backup_root: dir.join("backups"),
            retry: RetryPolicy::default(),
        },
        ..ServerConfig::default()
    }
}

pub fn test_state(name: &str, mailer: Arc<dyn Mailer>) -> (AppState, PathBuf) {
    let dir = make_temp_dir(name);
    let config = test_config(&dir);
    let db = Database::new(config.database_path.clone()).expect("open test database");
    let state = AppState::new(db, config, mailer, FlakyExecutor::new(0));
    (state, dir)
}
