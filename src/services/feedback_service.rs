use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::info;

use crate::db::{FeedbackFilter, NewFeedback, Page, Store};
use crate::entities::feedbacks;
use crate::models::AuthUser;

const TITLE_MAX: usize = 100;
const CONTENT_MAX: usize = 2000;
const REPLY_MAX: usize = 2000;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Feedback not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for FeedbackError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Bug,
    Feature,
    Question,
    #[default]
    Other,
}

impl FeedbackKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Question => "question",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        [Self::Bug, Self::Feature, Self::Question, Self::Other]
            .into_iter()
            .find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Open,
    Replied,
    Resolved,
    Closed,
}

impl FeedbackStatus {
    pub const ALL: [Self; 4] = [Self::Open, Self::Replied, Self::Resolved, Self::Closed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Replied => "replied",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    pub id: i32,
    pub user_id: String,
    pub username: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub admin_reply: Option<String>,
    pub replied_at: Option<String>,
    pub replied_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<feedbacks::Model> for FeedbackView {
    fn from(m: feedbacks::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            username: m.username,
            title: m.title,
            content: m.content,
            kind: m.kind,
            status: m.status,
            admin_reply: m.admin_reply,
            replied_at: m.replied_at,
            replied_by: m.replied_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackStats {
    pub total: u64,
    #[serde(rename = "byStatus")]
    pub by_status: BTreeMap<String, i64>,
    #[serde(rename = "byType")]
    pub by_kind: BTreeMap<String, i64>,
}

fn check_length(field: &str, value: &str, max: usize) -> Result<String, FeedbackError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > max {
        return Err(FeedbackError::Validation(format!(
            "{field} must be 1-{max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub struct FeedbackService {
    store: Store,
}

impl FeedbackService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        user: &AuthUser,
        title: &str,
        content: &str,
        kind: Option<&str>,
    ) -> Result<FeedbackView, FeedbackError> {
        let title = check_length("title", title, TITLE_MAX)?;
        let content = check_length("content", content, CONTENT_MAX)?;
        let kind = match kind.filter(|k| !k.is_empty()) {
            Some(k) => FeedbackKind::parse(k).ok_or_else(|| {
                FeedbackError::Validation(
                    "type must be one of: bug, feature, question, other".to_string(),
                )
            })?,
            None => FeedbackKind::default(),
        };

        let created = self
            .store
            .insert_feedback(
                NewFeedback {
                    user_id: user.user_id.clone(),
                    username: user.username.clone(),
                    title,
                    content,
                    kind: kind.as_str().to_string(),
                },
                FeedbackStatus::Open.as_str(),
            )
            .await?;

        info!(feedback_id = created.id, user_id = %user.user_id, "Feedback submitted");
        Ok(created.into())
    }

    pub async fn mine(&self, user_id: &str) -> Result<Vec<FeedbackView>, FeedbackError> {
        let rows = self.store.list_feedback_for_user(user_id).await?;
        Ok(rows.into_iter().map(FeedbackView::from).collect())
    }

    pub async fn list(
        &self,
        filter: &FeedbackFilter,
        page: Page,
    ) -> Result<(Vec<FeedbackView>, u64), FeedbackError> {
        let (rows, total) = self.store.list_feedback(filter, page).await?;
        Ok((rows.into_iter().map(FeedbackView::from).collect(), total))
    }

    /// Records an admin reply. The status defaults to `replied`.
    pub async fn reply(
        &self,
        id: i32,
        admin: &AuthUser,
        reply: &str,
        status: Option<FeedbackStatus>,
    ) -> Result<FeedbackView, FeedbackError> {
        let reply = check_length("reply", reply, REPLY_MAX)?;
        let status = status.unwrap_or(FeedbackStatus::Replied);

        let updated = self
            .store
            .reply_feedback(id, &reply, status.as_str(), &admin.username)
            .await?
            .ok_or(FeedbackError::NotFound)?;

        info!(feedback_id = id, status = %status, "Feedback replied");
        Ok(updated.into())
    }

    pub async fn set_status(
        &self,
        id: i32,
        status: FeedbackStatus,
    ) -> Result<FeedbackView, FeedbackError> {
        let updated = self
            .store
            .set_feedback_status(id, status.as_str())
            .await?
            .ok_or(FeedbackError::NotFound)?;
        Ok(updated.into())
    }

    pub async fn stats(&self) -> Result<FeedbackStats, FeedbackError> {
        let total = self.store.feedback_count().await?;
        let mut by_status: BTreeMap<String, i64> = FeedbackStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        by_status.extend(self.store.feedback_counts_by_status().await?);
        let by_kind = self.store.feedback_counts_by_kind().await?.into_iter().collect();

        Ok(FeedbackStats {
            total,
            by_status,
            by_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    async fn service() -> FeedbackService {
        let path =
            std::env::temp_dir().join(format!("mediagate-feedback-{}.db", uuid::Uuid::new_v4()));
        FeedbackService::new(Store::new(&format!("sqlite:{}", path.display())).await.unwrap())
    }

    fn user(name: &str, role: Role) -> AuthUser {
        AuthUser {
            user_id: format!("{name}-id"),
            username: name.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_submit_reply_and_stats() {
        let svc = service().await;
        let alice = user("alice", Role::User);
        let admin = user("admin", Role::Admin);

        let fb = svc
            .submit(&alice, "Crash", "It crashed on upload", Some("bug"))
            .await
            .unwrap();
        assert_eq!(fb.status, "open");
        assert_eq!(fb.kind, "bug");

        let replied = svc.reply(fb.id, &admin, "Fixed in next build", None).await.unwrap();
        assert_eq!(replied.status, "replied");
        assert_eq!(replied.replied_by.as_deref(), Some("admin"));

        let closed = svc.set_status(fb.id, FeedbackStatus::Closed).await.unwrap();
        assert_eq!(closed.status, "closed");

        let stats = svc.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status["closed"], 1);
        assert_eq!(stats.by_status["open"], 0);

        assert_eq!(svc.mine(&alice.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_validation_and_missing() {
        let svc = service().await;
        let alice = user("alice", Role::User);

        assert!(matches!(
            svc.submit(&alice, "", "body", None).await,
            Err(FeedbackError::Validation(_))
        ));
        assert!(matches!(
            svc.submit(&alice, &"x".repeat(101), "body", None).await,
            Err(FeedbackError::Validation(_))
        ));
        assert!(matches!(
            svc.submit(&alice, "t", "body", Some("rant")).await,
            Err(FeedbackError::Validation(_))
        ));
        assert!(matches!(
            svc.set_status(999, FeedbackStatus::Resolved).await,
            Err(FeedbackError::NotFound)
        ));
    }
}
