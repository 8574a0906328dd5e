use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use chrono::{FixedOffset, Utc};
use fleetwatch_core::CronSchedule;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct TimerEntry {
    token: CancellationToken,
    expression: String,
}

/// In-process cron timers keyed by job. One instance per concern, owned by the app state.
pub struct CronRegistry<K> {
    offset: FixedOffset,
    timers: Mutex<HashMap<K, TimerEntry>>,
}

impl<K> CronRegistry<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            timers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, TimerEntry>> {
        match self.timers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replaces any timer already registered under `key`.
    pub fn register<F, Fut>(&self, key: K, schedule: CronSchedule, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let entry = TimerEntry {
            token: token.clone(),
            expression: schedule.expression().to_string(),
        };

        if let Some(previous) = self.lock().insert(key.clone(), entry) {
            previous.token.cancel();
            debug!(?key, "replaced existing timer");
        }
        info!(?key, cron = schedule.expression(), "timer registered");

        let offset = self.offset;
        tokio::spawn(async move {
            let mut cursor = Utc::now();
            loop {
                let now = Utc::now();
                let Some(next) = schedule.next_after(cursor.max(now), offset) else {
                    debug!(?key, "schedule has no further fire times");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(wait) => {}
                }
                if token.is_cancelled() {
                    break;
                }

                debug!(?key, fire_at = %next, "timer fired");
                callback().await;
                cursor = next;
            }
        });
    }

    pub fn cancel(&self, key: &K) -> bool {
        match self.lock().remove(key) {
            Some(entry) => {
                entry.token.cancel();
                info!(?key, "timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    pub fn expression(&self, key: &K) -> Option<String> {
        self.lock().get(key).map(|entry| entry.expression.clone())
    }

    pub fn keys(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn shutdown(&self) {
        for (_, entry) in self.lock().drain() {
            entry.token.cancel();
        }
    }
}

impl<K> Drop for CronRegistry<K> {
    fn drop(&mut self) {
        let timers = match self.timers.get_mut() {
            Ok(timers) => timers,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, entry) in timers.drain() {
            entry.token.cancel();
        }
    }
}
