use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use fleetwatch_core::{ReportFormat, ReportKind};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::{ok, ApiJson, ApiResult};
use crate::config::ServerConfig;
use crate::db::{models::NotificationKind, Database};
use crate::error::ApiError;
use crate::reports::{self, render_blocking, RenderedReport, ReportError, ReportParams, TaskState};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub report_name: String,
    pub format: String,
    #[serde(flatten)]
    pub params: ReportParams,
}

impl ReportRequest {
    fn parse(&self) -> Result<(ReportKind, ReportFormat), ApiError> {
        Ok((self.report_name.parse()?, self.format.parse()?))
    }
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: Uuid,
    pub status: TaskState,
}

async fn build_report(
    db: &Database,
    config: &ServerConfig,
    kind: ReportKind,
    format: ReportFormat,
    params: &ReportParams,
) -> Result<RenderedReport, ReportError> {
    let table = reports::collect(db, kind, params, &config.reporting, Utc::now()).await?;
    Ok(render_blocking(table, format, config.report_dir.clone()).await?)
}

async fn file_response(report: &RenderedReport) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&report.path)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, report.content_type.to_string()),
            (header::CONTENT_DISPOSITION, report.content_disposition()),
        ],
        bytes,
    )
        .into_response())
}

fn parse_task_id(value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ApiError::bad_request(format!("invalid task id '{value}'")))
}

/// Renders synchronously and streams the file back; the temp file is removed afterwards.
pub async fn generate_report(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ReportRequest>,
) -> Result<Response, ApiError> {
    let (kind, format) = body.parse()?;
    let report = build_report(&state.db, &state.config, kind, format, &body.params).await?;
    info!(report = kind.as_str(), format = format.as_str(), file = %report.filename, "report generated");

    let response = file_response(&report).await;
    report.remove();
    response
}

pub async fn start_report_task(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ReportRequest>,
) -> ApiResult<TaskView> {
    let (kind, format) = body.parse()?;
    let db = state.db.clone();
    let config = state.config.clone();
    let params = body.params;

    let handle = state.report_tasks.spawn(async move {
        let result = build_report(&db, &config, kind, format, &params).await;
        if let Err(err) = &result {
            if let Err(db_err) = db
                .insert_notification(
                    NotificationKind::ReportFailed,
                    format!("{} report failed", kind.title()),
                    err.to_string(),
                )
                .await
            {
                error!(error = %db_err, "failed to persist report notification");
            }
        }
        result.map_err(|err| err.to_string())
    });

    info!(task_id = %handle.id, report = kind.as_str(), "report task started");
    ok(TaskView {
        id: handle.id,
        status: handle.state(),
    })
}

pub async fn report_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TaskView> {
    let task_id = parse_task_id(&id)?;
    let status = state
        .report_tasks
        .status(&task_id)
        .ok_or_else(|| ApiError::not_found(format!("report task {task_id} not found")))?;
    ok(TaskView { id: task_id, status })
}

/// Cancels a running task; a finished one is dropped along with its file.
pub async fn cancel_report_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TaskView> {
    let task_id = parse_task_id(&id)?;
    let tasks = &state.report_tasks;
    let status = tasks
        .status(&task_id)
        .ok_or_else(|| ApiError::not_found(format!("report task {task_id} not found")))?;

    if status.is_terminal() {
        tasks.remove(&task_id);
        return ok(TaskView { id: task_id, status });
    }

    tasks.cancel(&task_id);
    let status = match tasks.handle(&task_id) {
        Some(mut handle) => handle.wait().await,
        None => TaskState::Cancelled,
    };
    ok(TaskView { id: task_id, status })
}

pub async fn download_report_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let task_id = parse_task_id(&id)?;
    let status = state
        .report_tasks
        .status(&task_id)
        .ok_or_else(|| ApiError::not_found(format!("report task {task_id} not found")))?;

    match status {
        TaskState::Completed { .. } => {
            let report = state
                .report_tasks
                .output(&task_id)
                .ok_or_else(|| ApiError::not_found(format!("report task {task_id} has no output")))?;
            file_response(&report).await
        }
        TaskState::Failed { message } => Err(ApiError::Conflict(format!("report task failed: {message}"))),
        TaskState::Cancelled => Err(ApiError::Conflict("report task was cancelled".to_string())),
        TaskState::Pending | TaskState::Running => {
            Err(ApiError::Conflict("report is not ready yet".to_string()))
        }
    }
}
