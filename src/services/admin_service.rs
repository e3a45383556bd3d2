//! User administration and usage statistics.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::db::{Page, Store, User, UserFilter, VideoTaskFilter};
use crate::models::{AuthUser, Platform, Role, TaskStatus};
use crate::services::auth_service::{AuthError, AuthService};
use crate::services::config_service::{ConfigError, ConfigService};
use crate::services::image_service::task_view;
use crate::services::task_ledger::{LedgerError, TaskLedger, TaskRecord};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AdminError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<LedgerError> for AdminError {
    fn from(err: LedgerError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<ConfigError> for AdminError {
    fn from(err: ConfigError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<AuthError> for AdminError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserNotFound => Self::UserNotFound,
            AuthError::Validation(msg) => Self::Validation(msg),
            other => Self::Database(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub role: Role,
    #[serde(rename = "created_at")]
    pub created_at: String,
    #[serde(rename = "last_login")]
    pub last_login: Option<String>,
    pub video_task_count: u64,
    pub image_task_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserDetail {
    pub user: AdminUserView,
    pub config: Value,
    pub video_task_count: u64,
    pub image_task_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub admin_users: u64,
    pub total_video_tasks: u64,
    pub total_image_tasks: u64,
    pub video_by_platform: BTreeMap<String, i64>,
    pub video_by_status: BTreeMap<String, i64>,
    pub image_by_status: BTreeMap<String, i64>,
}

/// Zero-filled breakdown so every known bucket is present.
fn breakdown<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    counts: Vec<(String, i64)>,
) -> BTreeMap<String, i64> {
    let mut map: BTreeMap<String, i64> = keys.into_iter().map(|k| (k.to_string(), 0)).collect();
    map.extend(counts);
    map
}

pub struct AdminService {
    store: Store,
    auth: Arc<dyn AuthService>,
    config: Arc<dyn ConfigService>,
    ledger: Arc<dyn TaskLedger>,
}

impl AdminService {
    pub fn new(
        store: Store,
        auth: Arc<dyn AuthService>,
        config: Arc<dyn ConfigService>,
        ledger: Arc<dyn TaskLedger>,
    ) -> Self {
        Self {
            store,
            auth,
            config,
            ledger,
        }
    }

    async fn view(&self, user: User) -> Result<AdminUserView, AdminError> {
        let video_task_count = self.store.video_task_count_for_user(&user.id).await?;
        let image_task_count = self.store.image_task_count_for_user(&user.id).await?;
        Ok(AdminUserView {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
            last_login: user.last_login,
            video_task_count,
            image_task_count,
        })
    }

    async fn require_user(&self, user_id: &str) -> Result<User, AdminError> {
        self.store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AdminError::UserNotFound)
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        page: Page,
    ) -> Result<(Vec<AdminUserView>, u64), AdminError> {
        let (users, total) = self.store.list_users(filter, page).await?;
        let mut views = Vec::with_capacity(users.len());
        for user in users {
            views.push(self.view(user).await?);
        }
        Ok((views, total))
    }

    pub async fn user_detail(&self, user_id: &str) -> Result<AdminUserDetail, AdminError> {
        let user = self.view(self.require_user(user_id).await?).await?;
        let config = self.config.user_display(user_id).await?;
        Ok(AdminUserDetail {
            video_task_count: user.video_task_count,
            image_task_count: user.image_task_count,
            user,
            config,
        })
    }

    pub async fn user_video_tasks(
        &self,
        user_id: &str,
        filter: &VideoTaskFilter,
        page: Page,
    ) -> Result<(Vec<TaskRecord>, u64), AdminError> {
        self.require_user(user_id).await?;
        Ok(self.ledger.list(user_id, filter, page).await?)
    }

    pub async fn user_image_tasks(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<(Vec<Value>, u64), AdminError> {
        self.require_user(user_id).await?;
        let (rows, total) = self.store.list_image_tasks(user_id, page).await?;
        Ok((rows.iter().map(task_view).collect(), total))
    }

    /// Sets a user's password. Admins change their own through the
    /// regular password route.
    pub async fn reset_password(
        &self,
        admin: &AuthUser,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), AdminError> {
        if admin.user_id == user_id {
            return Err(AdminError::Validation(
                "Use the password change endpoint for your own account".to_string(),
            ));
        }

        self.require_user(user_id).await?;
        self.auth.reset_password(user_id, new_password).await?;
        info!(admin = %admin.username, user_id = %user_id, "Password reset by admin");
        Ok(())
    }

    pub async fn stats(&self) -> Result<AdminStats, AdminError> {
        Ok(AdminStats {
            total_users: self.store.user_count().await?,
            admin_users: self.store.user_count_by_role(Role::Admin).await?,
            total_video_tasks: self.store.video_task_count().await?,
            total_image_tasks: self.store.image_task_count().await?,
            video_by_platform: breakdown(
                Platform::ALL.iter().map(|p| p.as_str()),
                self.store.video_task_counts_by_platform().await?,
            ),
            video_by_status: breakdown(
                TaskStatus::ALL.iter().map(|s| s.as_str()),
                self.store.video_task_counts_by_status().await?,
            ),
            image_by_status: breakdown(
                [TaskStatus::Processing, TaskStatus::Completed, TaskStatus::Failed]
                    .iter()
                    .map(|s| s.as_str()),
                self.store.image_task_counts_by_status().await?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_zero_fills() {
        let map = breakdown(["sora", "veo", "grok"], vec![("veo".to_string(), 3)]);
        assert_eq!(map["sora"], 0);
        assert_eq!(map["veo"], 3);
        assert_eq!(map.len(), 3);
    }
}
