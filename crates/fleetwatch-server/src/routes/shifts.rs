use axum::extract::{Path, State};
use fleetwatch_core::ShiftWindow;
use serde::Deserialize;
use tracing::info;

use super::{ok, parse_id, ApiJson, ApiResult};
use crate::db::models::Shift;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShiftRequest {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
}

pub async fn list_shifts(State(state): State<AppState>) -> ApiResult<Vec<Shift>> {
    ok(state.db.list_shifts().await?)
}

pub async fn create_shift(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateShiftRequest>,
) -> ApiResult<Shift> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let window = ShiftWindow::parse(&body.start_time, &body.end_time)?;

    let shift = state
        .db
        .create_shift(name, window.start, window.end)
        .await
        .map_err(|err| ApiError::from_db(err, "shift name already exists"))?;
    info!(shift_id = shift.id, crosses_midnight = window.crosses_midnight(), "shift created");
    ok(shift)
}

pub async fn get_shift(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Shift> {
    let shift_id = parse_id(&id, "shift id")?;
    let shift = state
        .db
        .get_shift(shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("shift {shift_id} not found")))?;
    ok(shift)
}
