use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleetwatch_core::{JobStateError, ScheduleError, WindowError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::is_constraint_violation;
use crate::mail_runner::MailJobError;
use crate::reports::ReportError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// Maps constraint violations to 409 and everything else to 500.
    pub fn from_db(err: anyhow::Error, conflict_message: &str) -> Self {
        if is_constraint_violation(&err) {
            ApiError::Conflict(conflict_message.to_string())
        } else {
            ApiError::Internal(err)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<WindowError> for ApiError {
    fn from(err: WindowError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JobStateError> for ApiError {
    fn from(err: JobStateError) -> Self {
        match err {
            JobStateError::NotEditable(_)
            | JobStateError::NotDeletable
            | JobStateError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<MailJobError> for ApiError {
    fn from(err: MailJobError) -> Self {
        match err {
            MailJobError::NotFound(id) => ApiError::NotFound(format!("mail job {id} not found")),
            MailJobError::State(state) => state.into(),
            MailJobError::Schedule(schedule) => schedule.into(),
            MailJobError::Params(params) => params.into(),
            MailJobError::Database(db) => ApiError::Internal(db),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidParams(_) => ApiError::BadRequest(err.to_string()),
            ReportError::ControllerNotFound(_) | ReportError::ShiftNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ReportError::Render(render) => ApiError::Internal(render.into()),
            ReportError::Database(db) => ApiError::Internal(db),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(err) = &self {
            error!(error = %err, "request failed");
        }

        (status, Json(json!({ "message": self.message() }))).into_response()
    }
}
