use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};

use crate::db::{Page, timestamp};
use crate::entities::{image_tasks, prelude::*};
use crate::models::TaskStatus;

#[derive(Debug, Clone)]
pub struct NewImageTask {
    pub task_id: String,
    pub user_id: String,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: String,
    pub image_size: String,
}

pub struct ImageTaskRepository {
    conn: DatabaseConnection,
}

impl ImageTaskRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// New image tasks start out `processing`.
    pub async fn insert(&self, task: NewImageTask) -> Result<image_tasks::Model> {
        let now = timestamp();
        let active = image_tasks::ActiveModel {
            task_id: Set(task.task_id),
            user_id: Set(task.user_id),
            provider: Set(task.provider),
            model: Set(task.model),
            prompt: Set(task.prompt),
            aspect_ratio: Set(task.aspect_ratio),
            image_size: Set(task.image_size),
            status: Set(TaskStatus::Processing.as_str().to_string()),
            images: Set("[]".to_string()),
            error: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert image task")
    }

    pub async fn find_for_user(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Option<image_tasks::Model>> {
        ImageTasks::find()
            .filter(image_tasks::Column::UserId.eq(user_id))
            .filter(image_tasks::Column::TaskId.eq(task_id))
            .one(&self.conn)
            .await
            .context("Failed to query image task")
    }

    pub async fn mark_completed(&self, task_id: &str, images: &serde_json::Value) -> Result<bool> {
        let result = ImageTasks::update_many()
            .col_expr(
                image_tasks::Column::Status,
                Expr::value(TaskStatus::Completed.as_str().to_string()),
            )
            .col_expr(image_tasks::Column::Images, Expr::value(images.to_string()))
            .col_expr(image_tasks::Column::UpdatedAt, Expr::value(timestamp()))
            .filter(image_tasks::Column::TaskId.eq(task_id))
            .exec(&self.conn)
            .await
            .context("Failed to complete image task")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn mark_failed(&self, task_id: &str, error: &str) -> Result<bool> {
        let result = ImageTasks::update_many()
            .col_expr(
                image_tasks::Column::Status,
                Expr::value(TaskStatus::Failed.as_str().to_string()),
            )
            .col_expr(image_tasks::Column::Error, Expr::value(Some(error.to_string())))
            .col_expr(image_tasks::Column::UpdatedAt, Expr::value(timestamp()))
            .filter(image_tasks::Column::TaskId.eq(task_id))
            .exec(&self.conn)
            .await
            .context("Failed to mark image task failed")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<(Vec<image_tasks::Model>, u64)> {
        let query = ImageTasks::find()
            .filter(image_tasks::Column::UserId.eq(user_id))
            .order_by_desc(image_tasks::Column::CreatedAt)
            .order_by_desc(image_tasks::Column::Id);

        let total = query
            .clone()
            .count(&self.conn)
            .await
            .context("Failed to count image tasks")?;

        let rows = query
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.conn)
            .await
            .context("Failed to list image tasks")?;

        Ok((rows, total))
    }

    pub async fn count(&self) -> Result<u64> {
        ImageTasks::find()
            .count(&self.conn)
            .await
            .context("Failed to count image tasks")
    }

    pub async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        ImageTasks::find()
            .filter(image_tasks::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count image tasks for user")
    }

    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>> {
        ImageTasks::find()
            .select_only()
            .column(image_tasks::Column::Status)
            .column_as(image_tasks::Column::Id.count(), "count")
            .group_by(image_tasks::Column::Status)
            .into_tuple::<(String, i64)>()
            .all(&self.conn)
            .await
            .context("Failed to aggregate image tasks")
    }
}
