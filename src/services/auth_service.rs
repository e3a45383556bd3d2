//! Domain service for authentication and account management.
//!
//! Handles login, registration, bearer-token verification, password changes
//! and the first-run admin bootstrap.

use serde::Serialize;
use thiserror::Error;

use crate::models::{AuthUser, Role};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Bad signature, malformed payload or past expiry.
    #[error("Invalid or expired token")]
    InvalidOrExpired,

    /// A legacy token names a user that no longer exists.
    #[error("Token subject could not be resolved")]
    Unresolvable,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Token plus identity, returned by login and registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Credentials generated for the first admin account.
#[derive(Debug, Clone)]
pub struct BootstrapCredentials {
    pub username: String,
    pub password: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials, stamps `last_login` and issues a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or a wrong password.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Creates a regular user and issues a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UsernameTaken`] if the name is in use.
    async fn register(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Verifies a bearer token, resolving legacy username subjects.
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError>;

    async fn profile(&self, user_id: &str) -> Result<UserProfile, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the old password does not match.
    async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Sets a new password without knowing the old one.
    async fn reset_password(&self, user_id: &str, new_password: &str) -> Result<(), AuthError>;

    /// Creates an admin with a random password when no user exists yet.
    async fn bootstrap_admin(&self) -> Result<Option<BootstrapCredentials>, AuthError>;
}
