use chrono::{DateTime, Utc};
use fleetwatch_core::{
    shift::{parse_date, TIME_FORMAT},
    ReportKind, ReportWindow, ReportingConfig, StatusAggregator, StatusCategory,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::Database;

pub mod render;
pub mod tasks;

pub use render::{render_blocking, render_to_file, RenderError, RenderedReport};
pub use tasks::{ReportTasks, TaskState};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid report parameters: {0}")]
    InvalidParams(String),
    #[error("controller {0} not found")]
    ControllerNotFound(i64),
    #[error("shift {0} not found")]
    ShiftNotFound(i64),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Filters shared by every report kind; stored as JSON text on mail jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub controller_id: Option<i64>,
    pub date: Option<String>,
    pub days: Option<u32>,
    pub shift_id: Option<i64>,
}

impl ReportParams {
    pub fn from_json(text: &str) -> Result<Self, ReportError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|err| ReportError::InvalidParams(err.to_string()))
    }

    /// Checks what can be checked without the database: date syntax, a positive day
    /// count, and the controller a `status-history` report is about.
    pub fn check(&self, kind: ReportKind) -> Result<(), ReportError> {
        if let Some(date) = self.date.as_deref() {
            parse_date(date).map_err(|err| ReportError::InvalidParams(err.to_string()))?;
        }
        if self.days == Some(0) {
            return Err(ReportError::InvalidParams("days must be a positive integer".to_string()));
        }
        if kind == ReportKind::StatusHistory && self.controller_id.is_none() {
            return Err(ReportError::InvalidParams(
                "controllerId is required for status-history".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportCell {
    Text(String),
    Number(f64),
}

impl ReportCell {
    pub fn display(&self) -> String {
        match self {
            ReportCell::Text(text) => text.clone(),
            ReportCell::Number(value) => format!("{value:.2}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub kind: ReportKind,
    pub title: String,
    pub subtitle: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ReportCell>>,
}

pub async fn resolve_window(
    db: &Database,
    params: &ReportParams,
    config: &ReportingConfig,
    now: DateTime<Utc>,
) -> Result<ReportWindow, ReportError> {
    let date = params
        .date
        .as_deref()
        .map(parse_date)
        .transpose()
        .map_err(|err| ReportError::InvalidParams(err.to_string()))?;

    let shift = match params.shift_id {
        Some(shift_id) => Some(
            db.get_shift(shift_id)
                .await?
                .ok_or(ReportError::ShiftNotFound(shift_id))?
                .window(),
        ),
        None => None,
    };

    ReportWindow::resolve(date, params.days, shift, config.local_today(now), config)
        .map_err(|err| ReportError::InvalidParams(err.to_string()))
}

/// Gathers the rows of a report from the snapshot tables.
pub async fn collect(
    db: &Database,
    kind: ReportKind,
    params: &ReportParams,
    config: &ReportingConfig,
    now: DateTime<Utc>,
) -> Result<ReportTable, ReportError> {
    params.check(kind)?;
    let window = resolve_window(db, params, config, now).await?;
    let subtitle = format!(
        "{} to {}{}",
        window.first_day,
        window.last_day,
        window
            .shift
            .map(|s| format!(
                " (shift {}-{})",
                s.start.format(TIME_FORMAT),
                s.end.format(TIME_FORMAT)
            ))
            .unwrap_or_default()
    );

    match kind {
        ReportKind::OperatingRate => {
            let controllers = match params.controller_id {
                Some(id) => vec![db
                    .get_controller(id)
                    .await?
                    .ok_or(ReportError::ControllerNotFound(id))?],
                None => db.list_controllers().await?,
            };

            let aggregator = StatusAggregator::new(config.clone());
            let mut rows = Vec::with_capacity(controllers.len());
            for controller in controllers {
                let snapshots = db.fetch_snapshots(controller.id, &window, config).await?;
                let history = aggregator.aggregate(&snapshots);
                let mut row = vec![ReportCell::Text(controller.name)];
                row.extend(
                    StatusCategory::ALL
                        .iter()
                        .map(|c| ReportCell::Number(history.status_durations.get(*c))),
                );
                row.push(ReportCell::Number(history.operating_rate));
                row.push(ReportCell::Number(history.total_records as f64));
                rows.push(row);
            }

            let mut columns = vec!["Controller".to_string()];
            columns.extend(StatusCategory::ALL.iter().map(|c| format!("{} (min)", c.as_str())));
            columns.push("Operating rate (%)".to_string());
            columns.push("Records".to_string());

            Ok(ReportTable {
                kind,
                title: kind.title().to_string(),
                subtitle,
                columns,
                rows,
            })
        }
        ReportKind::StatusHistory => {
            let controller_id = params.controller_id.ok_or_else(|| {
                ReportError::InvalidParams("controllerId is required for status-history".to_string())
            })?;
            let controller = db
                .get_controller(controller_id)
                .await?
                .ok_or(ReportError::ControllerNotFound(controller_id))?;

            let snapshots = db.fetch_snapshots(controller_id, &window, config).await?;
            let flag = |value: bool| ReportCell::Text(if value { "yes" } else { "no" }.to_string());
            let rows = snapshots
                .iter()
                .map(|s| {
                    vec![
                        ReportCell::Text(
                            config
                                .to_local(s.recorded_at)
                                .format("%Y-%m-%d %H:%M:%S")
                                .to_string(),
                        ),
                        ReportCell::Text(s.category().as_str().to_string()),
                        flag(s.flags.connected),
                        flag(s.flags.servo_on),
                        flag(s.flags.operating),
                        flag(s.flags.alarm || s.flags.error),
                        flag(s.flags.stopped),
                    ]
                })
                .collect();

            Ok(ReportTable {
                kind,
                title: format!("{} - {}", kind.title(), controller.name),
                subtitle,
                columns: ["Local time", "Category", "Connected", "Servo", "Operating", "Alarm", "Stopped"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                rows,
            })
        }
    }
}
