use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::validation::{validate_password, validate_username};
use super::{ApiError, ApiResponse, AppState};
use crate::models::AuthUser;
use crate::services::{LoginResult, UserProfile};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Serialize)]
pub struct CodeVerification {
    pub verified: bool,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <token>` and attaches the caller as an
/// [`AuthUser`] request extension.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(&headers)
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

    let user = state.auth().authenticate(&token).await?;
    tracing::Span::current().record("user_id", user.user_id.as_str());

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Must run after [`auth_middleware`].
pub async fn require_admin(
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.role.is_admin() {
        tracing::warn!(user_id = %user.user_id, path = %request.uri().path(), "Admin route denied");
        return Err(ApiError::forbidden());
    }
    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    validate_password(&payload.password)?;

    let result = state
        .auth()
        .login(payload.username.trim(), &payload.password)
        .await?;
    Ok(Json(ApiResponse::success_with_message(result, "Login successful")))
}

/// POST /v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    let username = validate_username(&payload.username)?;
    validate_password(&payload.password)?;

    let result = state.auth().register(username, &payload.password).await?;
    Ok(Json(ApiResponse::success_with_message(
        result,
        "Registration successful",
    )))
}

/// GET /v1/auth/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let profile = state.auth().profile(&user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// PUT /v1/auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if payload.old_password.is_empty() {
        return Err(ApiError::validation("Old password is required"));
    }
    validate_password(&payload.new_password)?;

    state
        .auth()
        .change_password(&user.user_id, &payload.old_password, &payload.new_password)
        .await?;
    Ok(Json(ApiResponse::message("Password updated")))
}

/// GET /v1/auth/verify
pub async fn verify(Extension(user): Extension<AuthUser>) -> Json<ApiResponse<AuthUser>> {
    Json(ApiResponse::success(user))
}

/// POST /v1/auth/code/send
pub async fn send_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendCodeRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.verification().send(&payload.email).await?;
    Ok(Json(ApiResponse::message("Verification code sent")))
}

/// POST /v1/auth/code/verify
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<CodeVerification>>, ApiError> {
    if payload.code.trim().is_empty() {
        return Err(ApiError::validation("code is required"));
    }
    let verified = state
        .verification()
        .verify(&payload.email, &payload.code)
        .await?;
    Ok(Json(ApiResponse::success(CodeVerification { verified })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);
    }
}
