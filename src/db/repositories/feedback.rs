use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};

use crate::db::{Page, timestamp};
use crate::entities::{feedbacks, prelude::*};

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: String,
    pub username: String,
    pub title: String,
    pub content: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackFilter {
    pub status: Option<String>,
    pub kind: Option<String>,
    /// Matches title, content or username.
    pub keyword: Option<String>,
}

pub struct FeedbackRepository {
    conn: DatabaseConnection,
}

impl FeedbackRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, feedback: NewFeedback, status: &str) -> Result<feedbacks::Model> {
        let now = timestamp();
        let active = feedbacks::ActiveModel {
            user_id: Set(feedback.user_id),
            username: Set(feedback.username),
            title: Set(feedback.title),
            content: Set(feedback.content),
            kind: Set(feedback.kind),
            status: Set(status.to_string()),
            admin_reply: Set(None),
            replied_at: Set(None),
            replied_by: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert feedback")
    }

    pub async fn get(&self, id: i32) -> Result<Option<feedbacks::Model>> {
        Feedbacks::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query feedback")
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<feedbacks::Model>> {
        Feedbacks::find()
            .filter(feedbacks::Column::UserId.eq(user_id))
            .order_by_desc(feedbacks::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list feedback for user")
    }

    pub async fn list(
        &self,
        filter: &FeedbackFilter,
        page: Page,
    ) -> Result<(Vec<feedbacks::Model>, u64)> {
        let mut condition = Condition::all();

        if let Some(status) = &filter.status {
            condition = condition.add(feedbacks::Column::Status.eq(status.as_str()));
        }
        if let Some(kind) = &filter.kind {
            condition = condition.add(feedbacks::Column::Kind.eq(kind.as_str()));
        }
        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(feedbacks::Column::Title.contains(keyword))
                    .add(feedbacks::Column::Content.contains(keyword))
                    .add(feedbacks::Column::Username.contains(keyword)),
            );
        }

        let query = Feedbacks::find()
            .filter(condition)
            .order_by_desc(feedbacks::Column::CreatedAt);

        let total = query
            .clone()
            .count(&self.conn)
            .await
            .context("Failed to count feedback")?;

        let rows = query
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.conn)
            .await
            .context("Failed to list feedback")?;

        Ok((rows, total))
    }

    pub async fn reply(
        &self,
        id: i32,
        reply: &str,
        status: &str,
        replied_by: &str,
    ) -> Result<Option<feedbacks::Model>> {
        let now = timestamp();
        let result = Feedbacks::update_many()
            .col_expr(feedbacks::Column::AdminReply, Expr::value(Some(reply.to_string())))
            .col_expr(feedbacks::Column::Status, Expr::value(status.to_string()))
            .col_expr(feedbacks::Column::RepliedAt, Expr::value(Some(now.clone())))
            .col_expr(
                feedbacks::Column::RepliedBy,
                Expr::value(Some(replied_by.to_string())),
            )
            .col_expr(feedbacks::Column::UpdatedAt, Expr::value(now))
            .filter(feedbacks::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to reply to feedback")?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    pub async fn set_status(&self, id: i32, status: &str) -> Result<Option<feedbacks::Model>> {
        let result = Feedbacks::update_many()
            .col_expr(feedbacks::Column::Status, Expr::value(status.to_string()))
            .col_expr(feedbacks::Column::UpdatedAt, Expr::value(timestamp()))
            .filter(feedbacks::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update feedback status")?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    pub async fn count(&self) -> Result<u64> {
        Feedbacks::find()
            .count(&self.conn)
            .await
            .context("Failed to count feedback")
    }

    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>> {
        self.grouped_count(feedbacks::Column::Status).await
    }

    pub async fn count_by_kind(&self) -> Result<Vec<(String, i64)>> {
        self.grouped_count(feedbacks::Column::Kind).await
    }

    async fn grouped_count(&self, column: feedbacks::Column) -> Result<Vec<(String, i64)>> {
        Feedbacks::find()
            .select_only()
            .column(column)
            .column_as(feedbacks::Column::Id.count(), "count")
            .group_by(column)
            .into_tuple::<(String, i64)>()
            .all(&self.conn)
            .await
            .context("Failed to aggregate feedback")
    }
}
