use std::future::Future;
use std::time::Duration;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPlan {
    pub id: i64,
    pub controller_id: i64,
    pub name: String,
    pub weekdays: Vec<Weekday>,
    pub time: NaiveTime,
    pub enabled: bool,
}

impl BackupPlan {
    /// One weekly expression per selected weekday.
    pub fn cron_expressions(&self) -> Vec<(Weekday, String)> {
        let mut days = self.weekdays.clone();
        days.sort_by_key(|d| d.num_days_from_sunday());
        days.dedup();

        days.into_iter()
            .map(|day| {
                (
                    day,
                    format!(
                        "{} {} * * {}",
                        self.time.minute(),
                        self.time.hour(),
                        day.num_days_from_sunday()
                    ),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub attempts: u32,
    pub result: Result<T, E>,
}

/// Runs `op` once, then up to `max_retries` more times with a fixed delay between
/// attempts. Nothing is scheduled after the last failure.
pub async fn run_with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    attempts: attempt,
                    result: Ok(value),
                }
            }
            Err(err) if attempt <= policy.max_retries => {
                warn!(attempt, delay_secs = policy.delay.as_secs(), error = %err, "attempt failed, retrying");
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => {
                return RetryOutcome {
                    attempts: attempt,
                    result: Err(err),
                }
            }
        }
    }
}
