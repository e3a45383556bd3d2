use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, Paginated};
use crate::db::{FeedbackFilter, Page};
use crate::models::AuthUser;
use crate::services::FeedbackStatus;
use crate::services::feedback_service::{FeedbackStats, FeedbackView};

#[derive(Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub reply: String,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub keyword: Option<String>,
}

fn parse_status(status: &str) -> Result<FeedbackStatus, ApiError> {
    FeedbackStatus::parse(status).ok_or_else(|| {
        ApiError::validation("status must be one of: open, replied, resolved, closed")
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// POST /v1/feedback
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<ApiResponse<FeedbackView>>, ApiError> {
    let created = state
        .feedback()
        .submit(&user, &payload.title, &payload.content, payload.kind.as_deref())
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        created,
        "Feedback submitted",
    )))
}

/// GET /v1/feedback/my
pub async fn mine(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<FeedbackView>>>, ApiError> {
    Ok(Json(ApiResponse::success(
        state.feedback().mine(&user.user_id).await?,
    )))
}

/// GET /v1/feedback/admin/all
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedbackListQuery>,
) -> Result<Json<Paginated<FeedbackView>>, ApiError> {
    let status = non_empty(query.status.as_ref());
    if let Some(s) = &status {
        parse_status(s)?;
    }

    let filter = FeedbackFilter {
        status,
        kind: non_empty(query.kind.as_ref()),
        keyword: non_empty(query.keyword.as_ref()),
    };
    let page = Page::new(query.page, query.limit);
    let (items, total) = state.feedback().list(&filter, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// PUT /v1/feedback/admin/{id}/reply
pub async fn reply(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<ReplyRequest>,
) -> Result<Json<ApiResponse<FeedbackView>>, ApiError> {
    let status = non_empty(payload.status.as_ref())
        .map(|s| parse_status(&s))
        .transpose()?;
    let updated = state
        .feedback()
        .reply(id, &admin, &payload.reply, status)
        .await?;
    Ok(Json(ApiResponse::success_with_message(updated, "Reply saved")))
}

/// PUT /v1/feedback/admin/{id}/status
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<ApiResponse<FeedbackView>>, ApiError> {
    let status = parse_status(payload.status.trim())?;
    let updated = state.feedback().set_status(id, status).await?;
    Ok(Json(ApiResponse::success_with_message(
        updated,
        format!("Status set to {status}"),
    )))
}

/// GET /v1/feedback/admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<FeedbackStats>>, ApiError> {
    Ok(Json(ApiResponse::success(state.feedback().stats().await?)))
}
