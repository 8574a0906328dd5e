use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::{ok, parse_id, ApiResult};
use crate::db::models::Notification;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<Notification>> {
    ok(state.db.list_notifications(query.unread_only).await?)
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<i64> {
    let notification_id = parse_id(&id, "notification id")?;
    if !state.db.mark_notification_read(notification_id).await? {
        return Err(ApiError::not_found(format!(
            "notification {notification_id} not found"
        )));
    }
    ok(notification_id)
}
