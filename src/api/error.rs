use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::fmt;

use crate::clients::ProviderError;
use crate::models::Provider;
use crate::services::{
    AdminError, AuthError, ConfigError, FeedbackError, GatewayError, ImageError, LedgerError,
    VerificationError,
};

#[derive(Debug)]
pub enum ApiError {
    ValidationError(String),

    Unauthorized(String),

    Forbidden(String),

    NotFound(String),

    Conflict(String),

    /// A provider call failed. Carries the provider's status when it answered.
    Upstream {
        status: Option<u16>,
        message: String,
        details: Option<Value>,
    },

    RateLimited(String),

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::Upstream {
                status, message, ..
            } => match status {
                Some(code) => write!(f, "Provider error ({code}): {message}"),
                None => write!(f, "Provider error: {message}"),
            },
            Self::RateLimited(msg) => write!(f, "Rate limited: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, None),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            Self::Upstream {
                status,
                message,
                details,
            } => {
                tracing::warn!(provider_status = ?status, "Provider error: {}", message);
                let code = status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (code, message, details)
            }
            Self::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg, None),
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                    None,
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({ "status": "error", "message": message });
        if let Some(details) = details {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self::Upstream {
            status: err.status,
            message: err.message,
            details: err.details,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidOrExpired | AuthError::Unresolvable => {
                Self::Unauthorized(err.to_string())
            }
            AuthError::UsernameTaken => Self::ValidationError(err.to_string()),
            AuthError::UserNotFound => Self::NotFound(err.to_string()),
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProvider(name) => Self::unknown_provider(&name),
            ConfigError::Validation(msg) => Self::ValidationError(msg),
            ConfigError::Database(msg) => Self::DatabaseError(msg),
            ConfigError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => Self::not_found("Task", id),
            LedgerError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured(provider) => Self::not_configured(provider),
            GatewayError::Validation(msg) => Self::ValidationError(msg),
            GatewayError::Provider(e) => e.into(),
            GatewayError::Config(e) => e.into(),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::NotConfigured(provider) => Self::not_configured(provider),
            ImageError::Validation(msg) => Self::ValidationError(msg),
            ImageError::Provider(e) => e.into(),
            ImageError::Config(e) => e.into(),
            ImageError::Storage(msg) => Self::InternalError(msg),
            ImageError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::RateLimited { .. } => Self::RateLimited(err.to_string()),
            VerificationError::Validation(msg) => Self::ValidationError(msg),
            VerificationError::Delivery(msg) => Self::InternalError(msg),
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::Validation(msg) => Self::ValidationError(msg),
            FeedbackError::NotFound => Self::NotFound(err.to_string()),
            FeedbackError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Validation(msg) => Self::ValidationError(msg),
            AdminError::UserNotFound => Self::NotFound(err.to_string()),
            AdminError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("Admin privileges required".to_string())
    }

    pub fn unknown_provider(name: &str) -> Self {
        Self::ValidationError(format!(
            "Unknown service '{name}'. Valid services: {}",
            Provider::valid_names()
        ))
    }

    fn not_configured(provider: Provider) -> Self {
        Self::ValidationError(format!(
            "{provider} is not configured. Set a server in your configuration"
        ))
    }
}
