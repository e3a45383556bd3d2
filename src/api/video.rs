//! Video endpoints. Provider responses are passed through unchanged.

use axum::{
    Extension, Json,
    extract::{Multipart, Query, State},
};
use serde_json::Value;
use std::sync::Arc;

use super::upload::MultipartBody;
use super::validation::require_field;
use super::{ApiError, AppState, IdQuery};
use crate::clients::sora::{CharacterRequest, SoraCreateRequest};
use crate::models::{AuthUser, Platform};
use crate::services::VideoJobRequest;
use crate::services::gateway::MAX_REFERENCE_FILES;

const REFERENCE_FIELD: &str = "input_reference";

/// POST /v1/video/create
pub async fn create_sora(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SoraCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = state.gateway().create_sora(&user, &request).await?;
    Ok(Json(response))
}

/// GET /v1/video/query?id=
pub async fn query_sora(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    query_platform(&state, &user, Platform::Sora, &query.id).await
}

/// POST /v1/video/character
pub async fn create_character(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CharacterRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = state.gateway().create_character(&user, &request).await?;
    Ok(Json(response))
}

/// POST /v1/veo/create
pub async fn create_veo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    create_job(&state, &user, Platform::Veo, multipart).await
}

/// GET /v1/veo/query?id=
pub async fn query_veo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    query_platform(&state, &user, Platform::Veo, &query.id).await
}

/// POST /v1/grok/create
pub async fn create_grok(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    create_job(&state, &user, Platform::Grok, multipart).await
}

/// GET /v1/grok/query?id=
pub async fn query_grok(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    query_platform(&state, &user, Platform::Grok, &query.id).await
}

async fn create_job(
    state: &AppState,
    user: &AuthUser,
    platform: Platform,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let body = MultipartBody::read(multipart, REFERENCE_FIELD, MAX_REFERENCE_FILES).await?;

    let request = VideoJobRequest {
        model: body.text("model"),
        prompt: body.text("prompt").unwrap_or_default(),
        size: body.text("size"),
        seconds: body.number("seconds")?,
        aspect_ratio: body.text("aspect_ratio"),
        files: body.files,
    };

    let response = state.gateway().create_job(user, platform, request).await?;
    Ok(Json(response))
}

async fn query_platform(
    state: &AppState,
    user: &AuthUser,
    platform: Platform,
    id: &str,
) -> Result<Json<Value>, ApiError> {
    let id = require_field("id", id)?;
    let response = state.gateway().query(user, platform, id).await?;
    Ok(Json(response))
}
