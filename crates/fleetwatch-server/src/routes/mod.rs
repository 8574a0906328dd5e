use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::state::AppState;

pub mod backups;
pub mod controllers;
pub mod mail_jobs;
pub mod notifications;
pub mod reports;
pub mod shifts;
pub mod status;

/// Envelope every successful JSON response is wrapped in.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

/// JSON body extractor whose rejections use the API's `{message}` error shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Parses a numeric path or query id, naming the field in the 400 message.
pub fn parse_id(value: &str, field: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("{field} must be an integer, got '{value}'")))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status-history", get(status::status_history))
        .route(
            "/api/controllers",
            get(controllers::list_controllers).post(controllers::create_controller),
        )
        .route("/api/controllers/{id}", get(controllers::get_controller))
        .route(
            "/api/controllers/{id}/snapshots",
            post(controllers::ingest_snapshot),
        )
        .route(
            "/api/shifts",
            get(shifts::list_shifts).post(shifts::create_shift),
        )
        .route("/api/shifts/{id}", get(shifts::get_shift))
        .route(
            "/api/mail-jobs",
            get(mail_jobs::list_mail_jobs).post(mail_jobs::create_mail_job),
        )
        .route(
            "/api/mail-jobs/{id}",
            get(mail_jobs::get_mail_job)
                .put(mail_jobs::update_mail_job)
                .delete(mail_jobs::delete_mail_job),
        )
        .route("/api/reports/generate", post(reports::generate_report))
        .route("/api/reports/tasks", post(reports::start_report_task))
        .route(
            "/api/reports/tasks/{id}",
            get(reports::report_task_status).delete(reports::cancel_report_task),
        )
        .route(
            "/api/reports/tasks/{id}/download",
            get(reports::download_report_task),
        )
        .route(
            "/api/backup-plans",
            get(backups::list_backup_plans).post(backups::create_backup_plan),
        )
        .route("/api/backup-plans/{id}", delete(backups::delete_backup_plan))
        .route("/api/backup-plans/{id}/run", post(backups::run_backup_plan))
        .route("/api/backup-plans/{id}/runs", get(backups::list_backup_runs))
        .route("/api/notifications", get(notifications::list_notifications))
        .route(
            "/api/notifications/{id}/read",
            post(notifications::mark_notification_read),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
