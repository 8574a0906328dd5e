use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use fleetwatch_core::{StatusCategory, StatusFlags, StatusSnapshot};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ok, parse_id, ApiJson, ApiResult};
use crate::db::models::Controller;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateControllerRequest {
    pub name: String,
    pub model: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    /// Defaults to the time the request arrives.
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub flags: StatusFlags,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCreated {
    pub id: i64,
    pub category: StatusCategory,
}

pub async fn list_controllers(State(state): State<AppState>) -> ApiResult<Vec<Controller>> {
    ok(state.db.list_controllers().await?)
}

pub async fn create_controller(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateControllerRequest>,
) -> ApiResult<Controller> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let controller = state
        .db
        .create_controller(name, body.model, body.location)
        .await
        .map_err(|err| ApiError::from_db(err, "controller name already exists"))?;
    info!(controller_id = controller.id, name = %controller.name, "controller created");
    ok(controller)
}

pub async fn get_controller(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Controller> {
    let controller_id = parse_id(&id, "controller id")?;
    let controller = state
        .db
        .get_controller(controller_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("controller {controller_id} not found")))?;
    ok(controller)
}

pub async fn ingest_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SnapshotRequest>,
) -> ApiResult<SnapshotCreated> {
    let controller_id = parse_id(&id, "controller id")?;
    if state.db.get_controller(controller_id).await?.is_none() {
        return Err(ApiError::not_found(format!("controller {controller_id} not found")));
    }

    let snapshot = StatusSnapshot {
        controller_id,
        recorded_at: body.recorded_at.unwrap_or_else(Utc::now),
        flags: body.flags,
    };
    let category = snapshot.category();
    let id = state.db.insert_snapshot(snapshot).await?;
    ok(SnapshotCreated { id, category })
}
