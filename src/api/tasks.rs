use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, Paginated};
use crate::db::{Page, VideoTaskFilter};
use crate::models::{AuthUser, Platform, TaskStatus};
use crate::services::TaskRecord;

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub platform: Option<String>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl TaskListQuery {
    #[must_use]
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }

    pub fn filter(&self) -> Result<VideoTaskFilter, ApiError> {
        let platform = match self.platform.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => Some(Platform::parse(p).ok_or_else(|| {
                ApiError::validation(format!("Unknown platform '{p}'. Valid: sora, veo, grok"))
            })?),
            None => None,
        };
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(
                TaskStatus::parse(s)
                    .ok_or_else(|| ApiError::validation(format!("Unknown status '{s}'")))?,
            ),
            None => None,
        };
        Ok(VideoTaskFilter { platform, status })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub status: &'static str,
    pub message: String,
    pub deleted_count: u64,
}

/// GET /v1/tasks
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Paginated<TaskRecord>>, ApiError> {
    let filter = query.filter()?;
    let page = query.page();
    let (records, total) = state.ledger().list(&user.user_id, &filter, page).await?;
    Ok(Json(Paginated::new(records, total, page)))
}

/// DELETE /v1/tasks/{externalTaskId}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(external_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if !state.ledger().delete(&user.user_id, &external_id).await? {
        return Err(ApiError::not_found("Task", &external_id));
    }
    Ok(Json(ApiResponse::message("Task deleted")))
}

/// DELETE /v1/tasks/completed/clear
pub async fn clear_completed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ClearResponse>, ApiError> {
    let deleted_count = state.ledger().delete_all_completed(&user.user_id).await?;
    Ok(Json(ClearResponse {
        status: "success",
        message: format!("Cleared {deleted_count} completed tasks"),
        deleted_count,
    }))
}
