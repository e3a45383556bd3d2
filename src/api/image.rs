use axum::{
    Extension, Json,
    extract::{Multipart, Query, State},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::sync::Arc;

use super::upload::MultipartBody;
use super::validation::require_field;
use super::{ApiError, AppState, IdQuery};
use crate::clients::gemini::InlineImage;
use crate::models::AuthUser;
use crate::services::ImageRequest;
use crate::services::image_service::MAX_REFERENCE_IMAGES;

const REFERENCE_FIELD: &str = "reference_images";

/// POST /v1/image/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.images().create(&user, request).await?))
}

/// POST /v1/image/create-with-ref
pub async fn create_with_ref(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let request = request_from_multipart(multipart).await?;
    Ok(Json(state.images().create(&user, request).await?))
}

/// POST /v1/image/generate
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ImageRequest>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.images().generate(&user, request).await?))
}

/// POST /v1/image/generate-with-ref
pub async fn generate_with_ref(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let request = request_from_multipart(multipart).await?;
    Ok(Json(state.images().generate(&user, request).await?))
}

/// GET /v1/image/query?id=
pub async fn query(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = require_field("id", &query.id)?;
    Ok(Json(state.images().query(&user, id).await?))
}

async fn request_from_multipart(multipart: Multipart) -> Result<ImageRequest, ApiError> {
    let body = MultipartBody::read(multipart, REFERENCE_FIELD, MAX_REFERENCE_IMAGES).await?;

    let text = |camel: &str, snake: &str| body.text(camel).or_else(|| body.text(snake));

    Ok(ImageRequest {
        model: body.text("model"),
        prompt: body.text("prompt").unwrap_or_default(),
        aspect_ratio: text("aspectRatio", "aspect_ratio"),
        image_size: text("imageSize", "image_size"),
        size: body.text("size"),
        n: body.number("n")?,
        reference_images: body
            .files
            .iter()
            .map(|file| InlineImage {
                mime_type: file.content_type.clone(),
                data: STANDARD.encode(&file.bytes),
            })
            .collect(),
    })
}
