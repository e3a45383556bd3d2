//! Provider configuration endpoints: the caller's own overrides under
//! `/v1/user-config`, the global defaults under `/v1/config`.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::models::{AuthUser, Provider, ProviderPatch};
use crate::services::SyncOptions;
use crate::services::config_service::parse_patches;

#[derive(Deserialize)]
pub struct SyncDefaultsRequest {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub key: String,
    #[serde(flatten)]
    pub options: SyncOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDefaultsResponse {
    pub synced_services: Vec<&'static str>,
    pub config: Value,
}

fn parse_provider(name: &str) -> Result<Provider, ApiError> {
    Provider::parse(name).ok_or_else(|| ApiError::unknown_provider(name))
}

// User overrides

/// GET /v1/user-config
pub async fn get_user_config(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let config = state.provider_config().user_display(&user.user_id).await?;
    Ok(Json(ApiResponse::success(config)))
}

/// GET /v1/user-config/full
pub async fn get_user_config_full(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let config = state.provider_config().user_full(&user.user_id).await?;
    Ok(Json(ApiResponse::success(config)))
}

/// PUT /v1/user-config
pub async fn update_user_config(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let patches = parse_patches(&body)?;
    let service = state.provider_config();
    service.update_user_all(&user.user_id, &patches).await?;

    let config = service.user_display(&user.user_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        config,
        "Configuration updated",
    )))
}

/// PUT /v1/user-config/{service}
pub async fn update_user_provider(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(name): Path<String>,
    Json(patch): Json<ProviderPatch>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let provider = parse_provider(&name)?;
    let service = state.provider_config();
    service
        .update_user_provider(&user.user_id, provider, &patch)
        .await?;

    let config = service.user_display(&user.user_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        config,
        format!("{provider} configuration updated"),
    )))
}

/// PUT /v1/user-config/sync-default
pub async fn sync_defaults(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SyncDefaultsRequest>,
) -> Result<Json<ApiResponse<SyncDefaultsResponse>>, ApiError> {
    let service = state.provider_config();
    let touched = service
        .sync_defaults(&user.user_id, &payload.server, &payload.key, &payload.options)
        .await?;

    let config = service.user_display(&user.user_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        SyncDefaultsResponse {
            synced_services: touched.iter().map(|p| p.as_str()).collect(),
            config,
        },
        format!("Synced {} services", touched.len()),
    )))
}

// Global defaults

/// GET /v1/config
pub async fn get_global_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let config = state.provider_config().global_display().await?;
    Ok(Json(ApiResponse::success(config)))
}

/// GET /v1/config/full
pub async fn get_global_config_full(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let config = state.provider_config().global_full().await?;
    Ok(Json(ApiResponse::success(config)))
}

/// PUT /v1/config
pub async fn update_global_config(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Json(body): Json<Value>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let patches = parse_patches(&body)?;
    let service = state.provider_config();
    service.update_global_all(&patches).await?;
    tracing::info!(admin = %admin.username, count = patches.len(), "Global configuration updated");

    let config = service.global_display().await?;
    Ok(Json(ApiResponse::success_with_message(
        config,
        "Global configuration updated",
    )))
}

/// PUT /v1/config/{service}
pub async fn update_global_provider(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(name): Path<String>,
    Json(patch): Json<ProviderPatch>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let provider = parse_provider(&name)?;
    let service = state.provider_config();
    service.update_global_provider(provider, &patch).await?;
    tracing::info!(admin = %admin.username, provider = %provider, "Global provider configuration updated");

    let config = service.global_display().await?;
    Ok(Json(ApiResponse::success_with_message(
        config,
        format!("{provider} global configuration updated"),
    )))
}
