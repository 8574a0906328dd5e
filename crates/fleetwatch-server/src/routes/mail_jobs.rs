use axum::extract::{Path, State};
use fleetwatch_core::{
    shift::{parse_date, parse_time},
    MailJob, MailJobDraft, Recurrence, ScheduleSpec,
};
use serde::Deserialize;
use serde_json::Value;

use super::{ok, parse_id, ApiJson, ApiResult};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailJobRequest {
    pub recipient: String,
    pub report_name: String,
    pub schedule_date: String,
    pub schedule_time: String,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence: Option<String>,
    pub format: String,
    /// Either a JSON object or its text form.
    #[serde(default)]
    pub report_params: Option<Value>,
}

impl MailJobRequest {
    pub fn into_draft(self) -> Result<MailJobDraft, ApiError> {
        let date = parse_date(&self.schedule_date)?;
        let time = parse_time(&self.schedule_time)?;

        let schedule = if self.is_recurring {
            let recurrence = self
                .recurrence
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("recurrence is required for recurring jobs"))?
                .parse::<Recurrence>()?;
            ScheduleSpec::recurring(date, time, recurrence)
        } else {
            ScheduleSpec::one_time(date, time)
        };

        let report_params = match self.report_params {
            None | Some(Value::Null) => "{}".to_string(),
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
        };

        Ok(MailJobDraft {
            recipient: self.recipient.trim().to_string(),
            report_name: self.report_name.parse()?,
            schedule,
            format: self.format.parse()?,
            report_params,
        })
    }
}

pub async fn list_mail_jobs(State(state): State<AppState>) -> ApiResult<Vec<MailJob>> {
    ok(state.db.list_mail_jobs().await?)
}

pub async fn get_mail_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<MailJob> {
    let job_id = parse_id(&id, "mail job id")?;
    let job = state
        .db
        .get_mail_job(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("mail job {job_id} not found")))?;
    ok(job)
}

pub async fn create_mail_job(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<MailJobRequest>,
) -> ApiResult<MailJob> {
    let draft = body.into_draft()?;
    ok(state.mail_jobs.create(draft).await?)
}

pub async fn update_mail_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<MailJobRequest>,
) -> ApiResult<MailJob> {
    let job_id = parse_id(&id, "mail job id")?;
    let draft = body.into_draft()?;
    ok(state.mail_jobs.update(job_id, draft).await?)
}

pub async fn delete_mail_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MailJob> {
    let job_id = parse_id(&id, "mail job id")?;
    ok(state.mail_jobs.delete(job_id).await?)
}
