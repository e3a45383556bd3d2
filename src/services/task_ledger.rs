//! Domain service for video task records.
//!
//! Every task the gateway submits to a provider gets a row here. The ledger
//! seeds the row from the creation response and reconciles it against later
//! query responses, enforcing the task state machine.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::db::{Page, VideoTaskFilter, VideoTaskPatch};
use crate::entities::video_tasks;
use crate::models::{Platform, TaskStatus};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for LedgerError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// What the gateway knows about a task at submission time.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    pub user_id: String,
    pub external_id: String,
    pub platform: Platform,
    pub model: String,
    pub prompt: String,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: i32,
    pub external_task_id: String,
    pub user_id: String,
    pub platform: String,
    pub model: String,
    pub prompt: String,
    pub params: Value,
    pub status: TaskStatus,
    pub progress: i32,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<video_tasks::Model> for TaskRecord {
    fn from(model: video_tasks::Model) -> Self {
        Self {
            id: model.id,
            external_task_id: model.external_task_id,
            user_id: model.user_id,
            platform: model.platform,
            model: model.model,
            prompt: model.prompt,
            params: serde_json::from_str(&model.params).unwrap_or(Value::Null),
            status: TaskStatus::parse(&model.status).unwrap_or(TaskStatus::Unknown),
            progress: model.progress,
            video_url: model.video_url,
            thumbnail_url: model.thumbnail_url,
            error: model.error,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait::async_trait]
pub trait TaskLedger: Send + Sync {
    /// Records a freshly submitted task, seeding status from the provider's
    /// creation response.
    async fn create(
        &self,
        submission: TaskSubmission,
        initial_response: &Value,
    ) -> Result<TaskRecord, LedgerError>;

    /// Last-write-wins update keyed by the provider's task id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when no row matched.
    async fn update_by_external_id(
        &self,
        external_id: &str,
        patch: &VideoTaskPatch,
    ) -> Result<TaskRecord, LedgerError>;

    /// Applies a provider query response to the task `user_id` owns.
    /// Terminal tasks are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when `user_id` owns no such task.
    async fn reconcile(
        &self,
        user_id: &str,
        external_id: &str,
        platform: Platform,
        response: &Value,
    ) -> Result<TaskRecord, LedgerError>;

    async fn find_by_external_id(&self, external_id: &str)
    -> Result<Option<TaskRecord>, LedgerError>;

    async fn list(
        &self,
        user_id: &str,
        filter: &VideoTaskFilter,
        page: Page,
    ) -> Result<(Vec<TaskRecord>, u64), LedgerError>;

    /// Deletes one task owned by `user_id`.
    async fn delete(&self, user_id: &str, external_id: &str) -> Result<bool, LedgerError>;

    async fn delete_all_completed(&self, user_id: &str) -> Result<u64, LedgerError>;
}
