use axum::extract::{Query, State};
use chrono::Utc;
use fleetwatch_core::{
    shift::{parse_date, parse_days},
    ReportWindow, StatusAggregator, StatusHistory,
};
use serde::Deserialize;
use tracing::debug;

use super::{ok, parse_id, ApiResult};
use crate::error::ApiError;
use crate::state::AppState;

/// Raw query values; kept as text so malformed input maps to 400 instead of a rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryQuery {
    pub controller_id: Option<String>,
    pub shift_id: Option<String>,
    pub date: Option<String>,
    pub days: Option<String>,
}

pub async fn status_history(
    State(state): State<AppState>,
    Query(query): Query<StatusHistoryQuery>,
) -> ApiResult<StatusHistory> {
    let controller_id = match query.controller_id.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => parse_id(value, "controllerId")?,
        _ => return Err(ApiError::bad_request("controllerId is required")),
    };

    let date = query
        .date
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(parse_date)
        .transpose()?;
    let days = query
        .days
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(parse_days)
        .transpose()?;

    let shift = match query.shift_id.as_deref().filter(|value| !value.trim().is_empty()) {
        Some(value) => {
            let shift_id = parse_id(value, "shiftId")?;
            let shift = state
                .db
                .get_shift(shift_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("shift {shift_id} not found")))?;
            Some(shift.window())
        }
        None => None,
    };

    let reporting = &state.config.reporting;
    let window = ReportWindow::resolve(date, days, shift, reporting.local_today(Utc::now()), reporting)?;
    let snapshots = state
        .db
        .fetch_snapshots(controller_id, &window, reporting)
        .await?;
    debug!(controller_id, records = snapshots.len(), start = %window.start_utc, end = %window.end_utc, "status history window");

    ok(StatusAggregator::new(reporting.clone()).aggregate(&snapshots))
}
