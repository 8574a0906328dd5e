use axum::extract::{Path, State};
use chrono::Weekday;
use fleetwatch_core::{shift::parse_time, BackupPlan};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{ok, parse_id, ApiJson, ApiResult};
use crate::db::models::BackupRun;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupPlanRequest {
    pub controller_id: i64,
    pub name: String,
    /// 0 = Sunday .. 6 = Saturday; 7 is accepted as Sunday.
    pub weekdays: Vec<u8>,
    pub time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPlanView {
    #[serde(flatten)]
    pub plan: BackupPlan,
    pub cron_expressions: Vec<String>,
}

impl From<BackupPlan> for BackupPlanView {
    fn from(plan: BackupPlan) -> Self {
        let cron_expressions = plan
            .cron_expressions()
            .into_iter()
            .map(|(_, expression)| expression)
            .collect();
        Self {
            plan,
            cron_expressions,
        }
    }
}

fn weekday_from_index(index: u8) -> Result<Weekday, ApiError> {
    match index {
        0 | 7 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(ApiError::bad_request(format!("invalid weekday {other}"))),
    }
}

pub async fn list_backup_plans(State(state): State<AppState>) -> ApiResult<Vec<BackupPlanView>> {
    let plans = state.db.list_backup_plans().await?;
    ok(plans.into_iter().map(BackupPlanView::from).collect())
}

pub async fn create_backup_plan(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateBackupPlanRequest>,
) -> ApiResult<BackupPlanView> {
    if body.weekdays.is_empty() {
        return Err(ApiError::bad_request("at least one weekday is required"));
    }
    let weekdays = body
        .weekdays
        .iter()
        .map(|day| weekday_from_index(*day))
        .collect::<Result<Vec<_>, _>>()?;
    let time = parse_time(&body.time)?;

    if state.db.get_controller(body.controller_id).await?.is_none() {
        return Err(ApiError::not_found(format!(
            "controller {} not found",
            body.controller_id
        )));
    }

    let plan = state
        .db
        .create_backup_plan(body.controller_id, body.name.trim().to_string(), weekdays, time)
        .await?;
    let timers = state.backups.register_plan(&plan)?;
    info!(plan_id = plan.id, timers, "backup plan created");
    ok(plan.into())
}

pub async fn delete_backup_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<i64> {
    let plan_id = parse_id(&id, "backup plan id")?;
    state.backups.unregister_plan(plan_id);
    if !state.db.delete_backup_plan(plan_id).await? {
        return Err(ApiError::not_found(format!("backup plan {plan_id} not found")));
    }
    info!(plan_id, "backup plan deleted");
    ok(plan_id)
}

/// Runs the plan in the background; progress shows up in its run history.
pub async fn run_backup_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<i64> {
    let plan_id = parse_id(&id, "backup plan id")?;
    if state.db.get_backup_plan(plan_id).await?.is_none() {
        return Err(ApiError::not_found(format!("backup plan {plan_id} not found")));
    }

    let scheduler = state.backups.clone();
    tokio::spawn(async move {
        if let Err(err) = scheduler.run_plan(plan_id).await {
            error!(plan_id, error = %format!("{err:#}"), "manual backup run failed");
        }
    });
    ok(plan_id)
}

pub async fn list_backup_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<BackupRun>> {
    let plan_id = parse_id(&id, "backup plan id")?;
    if state.db.get_backup_plan(plan_id).await?.is_none() {
        return Err(ApiError::not_found(format!("backup plan {plan_id} not found")));
    }
    ok(state.db.list_backup_runs(plan_id).await?)
}
