use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};

use crate::db::{Page, timestamp};
use crate::entities::{prelude::*, video_tasks};
use crate::models::{Platform, TaskStatus};

#[derive(Debug, Clone)]
pub struct NewVideoTask {
    pub external_task_id: String,
    pub user_id: String,
    pub platform: Platform,
    pub model: String,
    pub prompt: String,
    pub params: serde_json::Value,
    pub status: TaskStatus,
    pub progress: i32,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
}

/// Columns to overwrite; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct VideoTaskPatch {
    pub status: Option<TaskStatus>,
    pub progress: Option<i32>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
    pub last_query_response: Option<serde_json::Value>,
}

impl VideoTaskPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.video_url.is_none()
            && self.thumbnail_url.is_none()
            && self.error.is_none()
            && self.last_query_response.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct VideoTaskFilter {
    pub platform: Option<Platform>,
    pub status: Option<TaskStatus>,
}

pub struct VideoTaskRepository {
    conn: DatabaseConnection,
}

impl VideoTaskRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, task: NewVideoTask) -> Result<video_tasks::Model> {
        let now = timestamp();
        let active = video_tasks::ActiveModel {
            external_task_id: Set(task.external_task_id),
            user_id: Set(task.user_id),
            platform: Set(task.platform.as_str().to_string()),
            model: Set(task.model),
            prompt: Set(task.prompt),
            params: Set(task.params.to_string()),
            status: Set(task.status.as_str().to_string()),
            progress: Set(task.progress),
            video_url: Set(task.video_url),
            thumbnail_url: Set(task.thumbnail_url),
            error: Set(task.error),
            last_query_response: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert video task")
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<video_tasks::Model>> {
        VideoTasks::find()
            .filter(video_tasks::Column::ExternalTaskId.eq(external_id))
            .one(&self.conn)
            .await
            .context("Failed to query video task")
    }

    pub async fn find_owned(
        &self,
        user_id: &str,
        external_id: &str,
    ) -> Result<Option<video_tasks::Model>> {
        VideoTasks::find()
            .filter(video_tasks::Column::ExternalTaskId.eq(external_id))
            .filter(video_tasks::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query video task")
    }

    /// Single-statement update keyed by the external id, then re-read.
    pub async fn update_by_external_id(
        &self,
        external_id: &str,
        patch: &VideoTaskPatch,
    ) -> Result<Option<video_tasks::Model>> {
        let condition = Condition::all().add(video_tasks::Column::ExternalTaskId.eq(external_id));
        if self.apply_patch(condition, patch).await? == 0 {
            return Ok(None);
        }
        self.find_by_external_id(external_id).await
    }

    /// Same as [`Self::update_by_external_id`] but only touches a row owned
    /// by `user_id`.
    pub async fn update_owned(
        &self,
        user_id: &str,
        external_id: &str,
        patch: &VideoTaskPatch,
    ) -> Result<Option<video_tasks::Model>> {
        let condition = Condition::all()
            .add(video_tasks::Column::ExternalTaskId.eq(external_id))
            .add(video_tasks::Column::UserId.eq(user_id));
        if self.apply_patch(condition, patch).await? == 0 {
            return Ok(None);
        }
        self.find_owned(user_id, external_id).await
    }

    async fn apply_patch(&self, condition: Condition, patch: &VideoTaskPatch) -> Result<u64> {
        let mut update = VideoTasks::update_many()
            .col_expr(video_tasks::Column::UpdatedAt, Expr::value(timestamp()))
            .filter(condition);

        if let Some(status) = patch.status {
            update = update.col_expr(
                video_tasks::Column::Status,
                Expr::value(status.as_str().to_string()),
            );
        }
        if let Some(progress) = patch.progress {
            update = update.col_expr(video_tasks::Column::Progress, Expr::value(progress));
        }
        if let Some(url) = &patch.video_url {
            update = update.col_expr(video_tasks::Column::VideoUrl, Expr::value(Some(url.clone())));
        }
        if let Some(url) = &patch.thumbnail_url {
            update = update.col_expr(
                video_tasks::Column::ThumbnailUrl,
                Expr::value(Some(url.clone())),
            );
        }
        if let Some(error) = &patch.error {
            update = update.col_expr(video_tasks::Column::Error, Expr::value(Some(error.clone())));
        }
        if let Some(raw) = &patch.last_query_response {
            update = update.col_expr(
                video_tasks::Column::LastQueryResponse,
                Expr::value(Some(raw.to_string())),
            );
        }

        let result = update
            .exec(&self.conn)
            .await
            .context("Failed to update video task")?;
        Ok(result.rows_affected)
    }

    pub async fn list(
        &self,
        user_id: &str,
        filter: &VideoTaskFilter,
        page: Page,
    ) -> Result<(Vec<video_tasks::Model>, u64)> {
        let mut condition = Condition::all().add(video_tasks::Column::UserId.eq(user_id));

        if let Some(platform) = filter.platform {
            condition = condition.add(video_tasks::Column::Platform.eq(platform.as_str()));
        }
        if let Some(status) = filter.status {
            condition = condition.add(video_tasks::Column::Status.eq(status.as_str()));
        }

        let query = VideoTasks::find()
            .filter(condition)
            .order_by_desc(video_tasks::Column::CreatedAt)
            .order_by_desc(video_tasks::Column::Id);

        let total = query
            .clone()
            .count(&self.conn)
            .await
            .context("Failed to count video tasks")?;

        let rows = query
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.conn)
            .await
            .context("Failed to list video tasks")?;

        Ok((rows, total))
    }

    pub async fn delete_owned(&self, user_id: &str, external_id: &str) -> Result<bool> {
        let result = VideoTasks::delete_many()
            .filter(video_tasks::Column::UserId.eq(user_id))
            .filter(video_tasks::Column::ExternalTaskId.eq(external_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete video task")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete_completed(&self, user_id: &str) -> Result<u64> {
        let result = VideoTasks::delete_many()
            .filter(video_tasks::Column::UserId.eq(user_id))
            .filter(video_tasks::Column::Status.eq(TaskStatus::Completed.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to clear completed video tasks")?;

        Ok(result.rows_affected)
    }

    pub async fn count(&self) -> Result<u64> {
        VideoTasks::find()
            .count(&self.conn)
            .await
            .context("Failed to count video tasks")
    }

    pub async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        VideoTasks::find()
            .filter(video_tasks::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count video tasks for user")
    }

    pub async fn count_by_platform(&self) -> Result<Vec<(String, i64)>> {
        self.grouped_count(video_tasks::Column::Platform).await
    }

    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>> {
        self.grouped_count(video_tasks::Column::Status).await
    }

    async fn grouped_count(&self, column: video_tasks::Column) -> Result<Vec<(String, i64)>> {
        VideoTasks::find()
            .select_only()
            .column(column)
            .column_as(video_tasks::Column::Id.count(), "count")
            .group_by(column)
            .into_tuple::<(String, i64)>()
            .all(&self.conn)
            .await
            .context("Failed to aggregate video tasks")
    }
}
