use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::tasks::TaskListQuery;
use super::validation::validate_password;
use super::{ApiError, ApiResponse, AppState, PageQuery, Paginated};
use crate::db::{Page, UserFilter};
use crate::models::{AuthUser, Role};
use crate::services::TaskRecord;
use crate::services::admin_service::{AdminStats, AdminUserDetail, AdminUserView};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub role: Option<String>,
    pub keyword: Option<String>,
}

impl UserListQuery {
    fn filter(&self) -> Result<UserFilter, ApiError> {
        let role = match self.role.as_deref().filter(|r| !r.is_empty()) {
            Some("admin") => Some(Role::Admin),
            Some("user") => Some(Role::User),
            Some(other) => {
                return Err(ApiError::validation(format!(
                    "Unknown role '{other}'. Valid: admin, user"
                )));
            }
            None => None,
        };

        Ok(UserFilter {
            role,
            keyword: self
                .keyword
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub new_password: String,
}

/// GET /v1/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Paginated<AdminUserView>>, ApiError> {
    let filter = query.filter()?;
    let page = Page::new(query.page, query.limit);
    let (users, total) = state.admin().list_users(&filter, page).await?;
    Ok(Json(Paginated::new(users, total, page)))
}

/// GET /v1/admin/users/{userId}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<AdminUserDetail>>, ApiError> {
    let detail = state.admin().user_detail(&user_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// GET /v1/admin/users/{userId}/video-tasks
pub async fn user_video_tasks(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Paginated<TaskRecord>>, ApiError> {
    let filter = query.filter()?;
    let page = query.page();
    let (records, total) = state
        .admin()
        .user_video_tasks(&user_id, &filter, page)
        .await?;
    Ok(Json(Paginated::new(records, total, page)))
}

/// GET /v1/admin/users/{userId}/image-tasks
pub async fn user_image_tasks(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<Value>>, ApiError> {
    let page = query.page();
    let (tasks, total) = state.admin().user_image_tasks(&user_id, page).await?;
    Ok(Json(Paginated::new(tasks, total, page)))
}

/// PUT /v1/admin/users/{userId}/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate_password(&payload.new_password)?;
    state
        .admin()
        .reset_password(&admin, &user_id, &payload.new_password)
        .await?;
    Ok(Json(ApiResponse::message("Password reset")))
}

/// GET /v1/admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AdminStats>>, ApiError> {
    Ok(Json(ApiResponse::success(state.admin().stats().await?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_filter() {
        let query = UserListQuery {
            role: Some("admin".to_string()),
            keyword: Some("  ali ".to_string()),
            ..UserListQuery::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.role, Some(Role::Admin));
        assert_eq!(filter.keyword.as_deref(), Some("ali"));

        let bad = UserListQuery {
            role: Some("root".to_string()),
            ..UserListQuery::default()
        };
        assert!(bad.filter().is_err());
    }
}
