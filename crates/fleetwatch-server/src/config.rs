use std::path::PathBuf;
use std::time::Duration;

use fleetwatch_core::{ReportingConfig, RetryPolicy};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub starttls: bool,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub source_root: PathBuf,
    pub backup_root: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("./data/controllers"),
            backup_root: PathBuf::from("./data/backups"),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub report_dir: PathBuf,
    pub reporting: ReportingConfig,
    pub smtp: Option<SmtpConfig>,
    pub backup: BackupConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            database_path: PathBuf::from("./data/fleetwatch.db"),
            report_dir: PathBuf::from("./data/reports"),
            reporting: ReportingConfig::default(),
            smtp: None,
            backup: BackupConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn backup_retry(max_retries: u32, delay_secs: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::from_secs(delay_secs),
        }
    }
}
