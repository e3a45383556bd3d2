use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{feedbacks, image_tasks, video_tasks};
use crate::models::{Provider, ProviderSettings, Role};

pub mod migrator;
pub mod repositories;

pub use repositories::feedback::{FeedbackFilter, NewFeedback};
pub use repositories::image_task::NewImageTask;
pub use repositories::user::{User, UserFilter};
pub use repositories::video_task::{NewVideoTask, VideoTaskFilter, VideoTaskPatch};

/// Storage timestamp. Fixed-width RFC 3339 in UTC so lexical order matches
/// chronological order.
#[must_use]
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Offset pagination. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
}

impl Page {
    pub const DEFAULT_LIMIT: u64 = 50;
    pub const MAX_LIMIT: u64 = 100;

    /// Clamps caller input: page defaults to 1, limit to 50 and never exceeds 100.
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit
                .filter(|l| *l > 0)
                .unwrap_or(Self::DEFAULT_LIMIT)
                .min(Self::MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to `:memory:` would open its own database.
        let (max_connections, min_connections) = if db_url.contains(":memory:") {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn user_config_repo(&self) -> repositories::provider_config::UserConfigRepository {
        repositories::provider_config::UserConfigRepository::new(self.conn.clone())
    }

    fn global_config_repo(&self) -> repositories::provider_config::GlobalConfigRepository {
        repositories::provider_config::GlobalConfigRepository::new(self.conn.clone())
    }

    fn video_task_repo(&self) -> repositories::video_task::VideoTaskRepository {
        repositories::video_task::VideoTaskRepository::new(self.conn.clone())
    }

    fn image_task_repo(&self) -> repositories::image_task::ImageTaskRepository {
        repositories::image_task::ImageTaskRepository::new(self.conn.clone())
    }

    fn feedback_repo(&self) -> repositories::feedback::FeedbackRepository {
        repositories::feedback::FeedbackRepository::new(self.conn.clone())
    }

    // Users

    pub async fn create_user(
        &self,
        id: &str,
        username: &str,
        credential: &str,
        role: Role,
    ) -> Result<Option<User>> {
        self.user_repo().create(id, username, credential, role).await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_credential(&self, username: &str) -> Result<Option<(User, String)>> {
        self.user_repo().get_credential_by_username(username).await
    }

    pub async fn get_user_credential_by_id(&self, id: &str) -> Result<Option<String>> {
        self.user_repo().get_credential_by_id(id).await
    }

    pub async fn update_user_credential(&self, id: &str, credential: &str) -> Result<bool> {
        self.user_repo().update_credential(id, credential).await
    }

    pub async fn touch_last_login(&self, id: &str) -> Result<()> {
        self.user_repo().touch_last_login(id).await
    }

    pub async fn user_count(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    pub async fn user_count_by_role(&self, role: Role) -> Result<u64> {
        self.user_repo().count_by_role(role).await
    }

    pub async fn list_user_ids(&self) -> Result<Vec<String>> {
        self.user_repo().list_ids().await
    }

    pub async fn list_users(&self, filter: &UserFilter, page: Page) -> Result<(Vec<User>, u64)> {
        self.user_repo().list(filter, page).await
    }

    // Provider configuration

    pub async fn ensure_user_config(&self, user_id: &str) -> Result<u64> {
        self.user_config_repo().ensure(user_id).await
    }

    pub async fn get_user_config(
        &self,
        user_id: &str,
    ) -> Result<HashMap<Provider, ProviderSettings>> {
        self.user_config_repo().get_all(user_id).await
    }

    pub async fn get_user_provider_config(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<ProviderSettings>> {
        self.user_config_repo().get(user_id, provider).await
    }

    pub async fn save_user_provider_config(
        &self,
        user_id: &str,
        provider: Provider,
        settings: &ProviderSettings,
    ) -> Result<bool> {
        self.user_config_repo().save(user_id, provider, settings).await
    }

    pub async fn seed_global_config(
        &self,
        defaults: &HashMap<Provider, ProviderSettings>,
    ) -> Result<u64> {
        self.global_config_repo().seed(defaults).await
    }

    pub async fn get_global_config(&self) -> Result<HashMap<Provider, ProviderSettings>> {
        self.global_config_repo().get_all().await
    }

    pub async fn get_global_provider_config(
        &self,
        provider: Provider,
    ) -> Result<Option<ProviderSettings>> {
        self.global_config_repo().get(provider).await
    }

    pub async fn save_global_provider_config(
        &self,
        provider: Provider,
        settings: &ProviderSettings,
    ) -> Result<()> {
        self.global_config_repo().save(provider, settings).await
    }

    // Video tasks

    pub async fn insert_video_task(&self, task: NewVideoTask) -> Result<video_tasks::Model> {
        self.video_task_repo().insert(task).await
    }

    pub async fn get_video_task(&self, external_id: &str) -> Result<Option<video_tasks::Model>> {
        self.video_task_repo().find_by_external_id(external_id).await
    }

    pub async fn get_owned_video_task(
        &self,
        user_id: &str,
        external_id: &str,
    ) -> Result<Option<video_tasks::Model>> {
        self.video_task_repo().find_owned(user_id, external_id).await
    }

    pub async fn update_owned_video_task(
        &self,
        user_id: &str,
        external_id: &str,
        patch: &VideoTaskPatch,
    ) -> Result<Option<video_tasks::Model>> {
        self.video_task_repo()
            .update_owned(user_id, external_id, patch)
            .await
    }

    pub async fn update_video_task(
        &self,
        external_id: &str,
        patch: &VideoTaskPatch,
    ) -> Result<Option<video_tasks::Model>> {
        self.video_task_repo()
            .update_by_external_id(external_id, patch)
            .await
    }

    pub async fn list_video_tasks(
        &self,
        user_id: &str,
        filter: &VideoTaskFilter,
        page: Page,
    ) -> Result<(Vec<video_tasks::Model>, u64)> {
        self.video_task_repo().list(user_id, filter, page).await
    }

    pub async fn delete_video_task(&self, user_id: &str, external_id: &str) -> Result<bool> {
        self.video_task_repo().delete_owned(user_id, external_id).await
    }

    pub async fn delete_completed_video_tasks(&self, user_id: &str) -> Result<u64> {
        self.video_task_repo().delete_completed(user_id).await
    }

    pub async fn video_task_count(&self) -> Result<u64> {
        self.video_task_repo().count().await
    }

    pub async fn video_task_count_for_user(&self, user_id: &str) -> Result<u64> {
        self.video_task_repo().count_for_user(user_id).await
    }

    pub async fn video_task_counts_by_platform(&self) -> Result<Vec<(String, i64)>> {
        self.video_task_repo().count_by_platform().await
    }

    pub async fn video_task_counts_by_status(&self) -> Result<Vec<(String, i64)>> {
        self.video_task_repo().count_by_status().await
    }

    // Image tasks

    pub async fn insert_image_task(&self, task: NewImageTask) -> Result<image_tasks::Model> {
        self.image_task_repo().insert(task).await
    }

    pub async fn get_image_task(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Option<image_tasks::Model>> {
        self.image_task_repo().find_for_user(user_id, task_id).await
    }

    pub async fn complete_image_task(
        &self,
        task_id: &str,
        images: &serde_json::Value,
    ) -> Result<bool> {
        self.image_task_repo().mark_completed(task_id, images).await
    }

    pub async fn fail_image_task(&self, task_id: &str, error: &str) -> Result<bool> {
        self.image_task_repo().mark_failed(task_id, error).await
    }

    pub async fn list_image_tasks(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<(Vec<image_tasks::Model>, u64)> {
        self.image_task_repo().list_for_user(user_id, page).await
    }

    pub async fn image_task_count(&self) -> Result<u64> {
        self.image_task_repo().count().await
    }

    pub async fn image_task_count_for_user(&self, user_id: &str) -> Result<u64> {
        self.image_task_repo().count_for_user(user_id).await
    }

    pub async fn image_task_counts_by_status(&self) -> Result<Vec<(String, i64)>> {
        self.image_task_repo().count_by_status().await
    }

    // Feedback

    pub async fn insert_feedback(
        &self,
        feedback: NewFeedback,
        status: &str,
    ) -> Result<feedbacks::Model> {
        self.feedback_repo().insert(feedback, status).await
    }

    pub async fn get_feedback(&self, id: i32) -> Result<Option<feedbacks::Model>> {
        self.feedback_repo().get(id).await
    }

    pub async fn list_feedback_for_user(&self, user_id: &str) -> Result<Vec<feedbacks::Model>> {
        self.feedback_repo().list_for_user(user_id).await
    }

    pub async fn list_feedback(
        &self,
        filter: &FeedbackFilter,
        page: Page,
    ) -> Result<(Vec<feedbacks::Model>, u64)> {
        self.feedback_repo().list(filter, page).await
    }

    pub async fn reply_feedback(
        &self,
        id: i32,
        reply: &str,
        status: &str,
        replied_by: &str,
    ) -> Result<Option<feedbacks::Model>> {
        self.feedback_repo().reply(id, reply, status, replied_by).await
    }

    pub async fn set_feedback_status(
        &self,
        id: i32,
        status: &str,
    ) -> Result<Option<feedbacks::Model>> {
        self.feedback_repo().set_status(id, status).await
    }

    pub async fn feedback_count(&self) -> Result<u64> {
        self.feedback_repo().count().await
    }

    pub async fn feedback_counts_by_status(&self) -> Result<Vec<(String, i64)>> {
        self.feedback_repo().count_by_status().await
    }

    pub async fn feedback_counts_by_kind(&self) -> Result<Vec<(String, i64)>> {
        self.feedback_repo().count_by_kind().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> Store {
        let path = std::env::temp_dir().join(format!("mediagate-db-{}.db", uuid::Uuid::new_v4()));
        Store::new(&format!("sqlite:{}", path.display())).await.unwrap()
    }

    #[test]
    fn test_page_clamping() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: 50 });
        assert_eq!(Page::new(Some(0), Some(0)), Page { page: 1, limit: 50 });
        assert_eq!(Page::new(Some(3), Some(500)).limit, 100);
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
    }

    #[tokio::test]
    async fn test_user_config_ensure_is_idempotent() {
        let store = temp_store().await;

        assert_eq!(store.ensure_user_config("u1").await.unwrap(), 5);
        assert_eq!(store.ensure_user_config("u1").await.unwrap(), 0);

        let (a, b) = tokio::join!(store.ensure_user_config("u2"), store.ensure_user_config("u2"));
        assert_eq!(a.unwrap() + b.unwrap(), 5);
        assert_eq!(store.get_user_config("u2").await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_username_returns_none() {
        let store = temp_store().await;
        let first = store
            .create_user("aaaaaaaaaaaaaaaaaaaaaaaa", "alice", "x:y", Role::User)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .create_user("bbbbbbbbbbbbbbbbbbbbbbbb", "alice", "x:y", Role::User)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_global_seed_keeps_existing_rows() {
        let store = temp_store().await;
        let mut defaults = HashMap::new();
        defaults.insert(
            Provider::Veo,
            ProviderSettings {
                server: "https://seed".to_string(),
                ..ProviderSettings::default()
            },
        );
        store.seed_global_config(&defaults).await.unwrap();

        let edited = ProviderSettings {
            server: "https://edited".to_string(),
            ..ProviderSettings::default()
        };
        store
            .save_global_provider_config(Provider::Veo, &edited)
            .await
            .unwrap();
        store.seed_global_config(&defaults).await.unwrap();

        let veo = store
            .get_global_provider_config(Provider::Veo)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(veo.server, "https://edited");
    }
}
