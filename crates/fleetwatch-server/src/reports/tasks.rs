use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::RenderedReport;

/// How long a finished task and its file stay downloadable before they are dropped.
pub const DEFAULT_TASK_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed { filename: String },
    Failed { message: String },
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed { .. } | TaskState::Failed { .. } | TaskState::Cancelled
        )
    }
}

struct TaskEntry {
    cancel: CancellationToken,
    state: watch::Receiver<TaskState>,
    output: Arc<Mutex<Option<RenderedReport>>>,
}

/// Caller-side view of one background report generation.
pub struct ReportTaskHandle {
    pub id: Uuid,
    cancel: CancellationToken,
    state: watch::Receiver<TaskState>,
}

impl ReportTaskHandle {
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the task reaches a terminal state.
    pub async fn wait(&mut self) -> TaskState {
        if let Ok(state) = self.state.wait_for(TaskState::is_terminal).await {
            return state.clone();
        }
        self.state.borrow().clone()
    }
}

type TaskMap = HashMap<Uuid, TaskEntry>;

fn lock_tasks(tasks: &Mutex<TaskMap>) -> MutexGuard<'_, TaskMap> {
    match tasks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn discard(entry: &TaskEntry) {
    let slot = match entry.output.lock() {
        Ok(slot) => slot,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(report) = slot.as_ref() {
        report.remove();
    }
}

#[derive(Clone)]
pub struct ReportTasks {
    tasks: Arc<Mutex<TaskMap>>,
    retention: Duration,
}

impl Default for ReportTasks {
    fn default() -> Self {
        Self::with_retention(DEFAULT_TASK_RETENTION)
    }
}

impl ReportTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished tasks are evicted, file included, `retention` after they settle.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskMap> {
        lock_tasks(&self.tasks)
    }

    pub fn spawn<Fut>(&self, work: Fut) -> ReportTaskHandle
    where
        Fut: Future<Output = Result<RenderedReport, String>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(TaskState::Pending);
        let output = Arc::new(Mutex::new(None));

        self.lock().insert(
            id,
            TaskEntry {
                cancel: cancel.clone(),
                state: state_rx.clone(),
                output: output.clone(),
            },
        );

        let token = cancel.clone();
        let tasks = self.tasks.clone();
        let retention = self.retention;
        tokio::spawn(async move {
            let _ = state_tx.send(TaskState::Running);
            let mut work = Box::pin(work);

            let terminal = tokio::select! {
                biased;
                result = &mut work => match result {
                    Ok(report) if token.is_cancelled() => {
                        report.remove();
                        TaskState::Cancelled
                    }
                    Ok(report) => {
                        let filename = report.filename.clone();
                        match output.lock() {
                            Ok(mut slot) => *slot = Some(report),
                            Err(poisoned) => *poisoned.into_inner() = Some(report),
                        }
                        TaskState::Completed { filename }
                    }
                    Err(message) => TaskState::Failed { message },
                },
                _ = token.cancelled() => {
                    // A render already handed to the blocking pool still finishes; drop its file.
                    tokio::spawn(async move {
                        if let Ok(report) = work.await {
                            debug!(task_id = %id, file = %report.path.display(), "removing output of cancelled task");
                            report.remove();
                        }
                    });
                    TaskState::Cancelled
                }
            };

            match &terminal {
                TaskState::Failed { message } => warn!(task_id = %id, %message, "report task failed"),
                other => info!(task_id = %id, state = ?other, "report task finished"),
            }
            let _ = state_tx.send(terminal);

            tokio::time::sleep(retention).await;
            let expired = lock_tasks(&tasks).remove(&id);
            if let Some(entry) = expired {
                discard(&entry);
                debug!(task_id = %id, "report task evicted");
            }
        });

        ReportTaskHandle {
            id,
            cancel,
            state: state_rx,
        }
    }

    pub fn status(&self, id: &Uuid) -> Option<TaskState> {
        self.lock().get(id).map(|entry| entry.state.borrow().clone())
    }

    pub fn handle(&self, id: &Uuid) -> Option<ReportTaskHandle> {
        self.lock().get(id).map(|entry| ReportTaskHandle {
            id: *id,
            cancel: entry.cancel.clone(),
            state: entry.state.clone(),
        })
    }

    /// Returns false for unknown ids. Cancelling a finished task has no effect.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.lock().get(id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn output(&self, id: &Uuid) -> Option<RenderedReport> {
        let guard = self.lock();
        let entry = guard.get(id)?;
        let slot = match entry.output.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }

    /// Drops a task, cancelling it if still running, and deletes its file.
    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                discard(&entry);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
