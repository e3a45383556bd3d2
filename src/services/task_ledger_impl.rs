//! `SeaORM` implementation of the `TaskLedger` trait.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::db::{NewVideoTask, Page, Store, VideoTaskFilter, VideoTaskPatch};
use crate::models::{Platform, ProviderSnapshot, TaskStatus};
use crate::services::task_ledger::{LedgerError, TaskLedger, TaskRecord, TaskSubmission};

/// Progress reported for a running task whose provider gives no number.
const DEFAULT_RUNNING_PROGRESS: i32 = 50;

pub struct SeaOrmTaskLedger {
    store: Store,
}

impl SeaOrmTaskLedger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

/// Builds the column patch for moving a task into `status`.
fn patch_for(status: TaskStatus, snapshot: ProviderSnapshot) -> VideoTaskPatch {
    let mut patch = VideoTaskPatch {
        status: Some(status),
        ..VideoTaskPatch::default()
    };

    match status {
        TaskStatus::Completed => {
            patch.progress = Some(100);
            patch.video_url = snapshot.video_url;
            patch.thumbnail_url = snapshot.thumbnail_url;
        }
        TaskStatus::Processing => {
            patch.progress = Some(snapshot.progress.unwrap_or(DEFAULT_RUNNING_PROGRESS));
        }
        TaskStatus::Failed => {
            patch.error = snapshot.error;
        }
        TaskStatus::Queued | TaskStatus::Unknown => {
            patch.progress = snapshot.progress;
        }
    }

    patch
}

#[async_trait]
impl TaskLedger for SeaOrmTaskLedger {
    async fn create(
        &self,
        submission: TaskSubmission,
        initial_response: &Value,
    ) -> Result<TaskRecord, LedgerError> {
        let snapshot = ProviderSnapshot::from_response(submission.platform, initial_response);
        let status = match snapshot.status {
            Some(TaskStatus::Unknown) | None => TaskStatus::Queued,
            Some(status) => status,
        };
        let seed = patch_for(status, snapshot);

        let model = self
            .store
            .insert_video_task(NewVideoTask {
                external_task_id: submission.external_id,
                user_id: submission.user_id,
                platform: submission.platform,
                model: submission.model,
                prompt: submission.prompt,
                params: submission.params,
                status,
                progress: seed.progress.unwrap_or(0),
                video_url: seed.video_url,
                thumbnail_url: seed.thumbnail_url,
                error: seed.error,
            })
            .await?;

        info!(
            task_id = %model.external_task_id,
            platform = %model.platform,
            status = %status,
            "Video task recorded"
        );
        Ok(model.into())
    }

    async fn update_by_external_id(
        &self,
        external_id: &str,
        patch: &VideoTaskPatch,
    ) -> Result<TaskRecord, LedgerError> {
        self.store
            .update_video_task(external_id, patch)
            .await?
            .map(TaskRecord::from)
            .ok_or_else(|| LedgerError::NotFound(external_id.to_string()))
    }

    async fn reconcile(
        &self,
        user_id: &str,
        external_id: &str,
        platform: Platform,
        response: &Value,
    ) -> Result<TaskRecord, LedgerError> {
        let current: TaskRecord = self
            .store
            .get_owned_video_task(user_id, external_id)
            .await?
            .map(TaskRecord::from)
            .ok_or_else(|| LedgerError::NotFound(external_id.to_string()))?;

        if current.status.is_terminal() {
            debug!(task_id = %external_id, status = %current.status, "Task already terminal");
            return Ok(current);
        }

        let snapshot = ProviderSnapshot::from_response(platform, response);
        let mut patch = match snapshot.status {
            Some(next) if current.status.can_transition_to(next) => patch_for(next, snapshot),
            Some(next) => {
                debug!(
                    task_id = %external_id,
                    from = %current.status,
                    to = %next,
                    "Ignoring status regression"
                );
                VideoTaskPatch::default()
            }
            None => VideoTaskPatch::default(),
        };
        patch.last_query_response = Some(response.clone());

        let updated: TaskRecord = self
            .store
            .update_owned_video_task(user_id, external_id, &patch)
            .await?
            .map(TaskRecord::from)
            .ok_or_else(|| LedgerError::NotFound(external_id.to_string()))?;
        if updated.status != current.status {
            info!(
                task_id = %external_id,
                from = %current.status,
                to = %updated.status,
                "Video task status changed"
            );
            metrics::counter!("video_task_transitions_total", "status" => updated.status.as_str())
                .increment(1);
        }
        Ok(updated)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<TaskRecord>, LedgerError> {
        Ok(self
            .store
            .get_video_task(external_id)
            .await?
            .map(TaskRecord::from))
    }

    async fn list(
        &self,
        user_id: &str,
        filter: &VideoTaskFilter,
        page: Page,
    ) -> Result<(Vec<TaskRecord>, u64), LedgerError> {
        let (rows, total) = self.store.list_video_tasks(user_id, filter, page).await?;
        Ok((rows.into_iter().map(TaskRecord::from).collect(), total))
    }

    async fn delete(&self, user_id: &str, external_id: &str) -> Result<bool, LedgerError> {
        Ok(self.store.delete_video_task(user_id, external_id).await?)
    }

    async fn delete_all_completed(&self, user_id: &str) -> Result<u64, LedgerError> {
        let deleted = self.store.delete_completed_video_tasks(user_id).await?;
        if deleted > 0 {
            info!(user_id = %user_id, count = deleted, "Cleared completed video tasks");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn ledger() -> SeaOrmTaskLedger {
        let path =
            std::env::temp_dir().join(format!("mediagate-ledger-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", path.display())).await.unwrap();
        SeaOrmTaskLedger::new(store)
    }

    fn submission(id: &str, platform: Platform) -> TaskSubmission {
        TaskSubmission {
            user_id: "u1".to_string(),
            external_id: id.to_string(),
            platform,
            model: "sora-2".to_string(),
            prompt: "a cat".to_string(),
            params: json!({"duration": 10}),
        }
    }

    #[tokio::test]
    async fn test_create_seeds_status() {
        let ledger = ledger().await;

        let queued = ledger
            .create(submission("T1", Platform::Sora), &json!({"id": "T1"}))
            .await
            .unwrap();
        assert_eq!(queued.status, TaskStatus::Queued);
        assert_eq!(queued.progress, 0);
        assert_eq!(queued.params["duration"], 10);

        let done = ledger
            .create(
                submission("T2", Platform::Sora),
                &json!({"status": "completed", "video_url": "https://cdn/v.mp4"}),
            )
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.video_url.as_deref(), Some("https://cdn/v.mp4"));

        let failed = ledger
            .create(
                submission("T3", Platform::Veo),
                &json!({"status": "failed", "message": "bad prompt"}),
            )
            .await
            .unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("bad prompt"));
    }

    #[tokio::test]
    async fn test_reconcile_walks_state_machine() {
        let ledger = ledger().await;
        ledger
            .create(submission("T1", Platform::Sora), &json!({"status": "queued"}))
            .await
            .unwrap();

        let running = ledger
            .reconcile("u1", "T1", Platform::Sora, &json!({"status": "in_progress"}))
            .await
            .unwrap();
        assert_eq!(running.status, TaskStatus::Processing);
        assert_eq!(running.progress, 50);

        // No regression back to queued.
        let still = ledger
            .reconcile("u1", "T1", Platform::Sora, &json!({"status": "pending"}))
            .await
            .unwrap();
        assert_eq!(still.status, TaskStatus::Processing);

        let done = ledger
            .reconcile(
                "u1",
                "T1",
                Platform::Sora,
                &json!({"status": "completed", "output": {"video_url": "https://cdn/x.mp4"}}),
            )
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.video_url.as_deref(), Some("https://cdn/x.mp4"));

        // Terminal: later responses are ignored.
        let again = ledger
            .reconcile("u1", "T1", Platform::Sora, &json!({"status": "failed", "error": "late"}))
            .await
            .unwrap();
        assert_eq!(again.status, TaskStatus::Completed);
        assert!(again.error.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_unmapped_status_is_unknown() {
        let ledger = ledger().await;
        ledger
            .create(submission("G1", Platform::Grok), &json!({}))
            .await
            .unwrap();

        let record = ledger
            .reconcile("u1", "G1", Platform::Grok, &json!({"status": "moderating"}))
            .await
            .unwrap();
        assert_eq!(record.status, TaskStatus::Unknown);

        let record = ledger
            .reconcile(
                "u1",
                "G1",
                Platform::Grok,
                &json!({"status": "failed", "error": {"message": "nsfw"}}),
            )
            .await
            .unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("nsfw"));
    }

    #[tokio::test]
    async fn test_update_missing_task_is_not_found() {
        let ledger = ledger().await;
        let patch = VideoTaskPatch {
            progress: Some(10),
            ..VideoTaskPatch::default()
        };
        assert!(matches!(
            ledger.update_by_external_id("nope", &patch).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger.reconcile("u1", "nope", Platform::Veo, &json!({})).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete_are_scoped() {
        let ledger = ledger().await;
        for id in ["A", "B", "C"] {
            ledger
                .create(submission(id, Platform::Veo), &json!({"status": "queued"}))
                .await
                .unwrap();
        }
        ledger
            .reconcile("u1", "B", Platform::Veo, &json!({"status": "completed"}))
            .await
            .unwrap();

        let (all, total) = ledger
            .list("u1", &VideoTaskFilter::default(), Page::new(None, None))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].external_task_id, "C");

        let filter = VideoTaskFilter {
            status: Some(TaskStatus::Completed),
            ..VideoTaskFilter::default()
        };
        let (done, _) = ledger.list("u1", &filter, Page::new(None, None)).await.unwrap();
        assert_eq!(done.len(), 1);

        assert!(!ledger.delete("someone-else", "A").await.unwrap());
        assert!(ledger.delete("u1", "A").await.unwrap());
        assert_eq!(ledger.delete_all_completed("u1").await.unwrap(), 1);
        assert!(ledger.find_by_external_id("C").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reconcile_ignores_other_users_tasks() {
        let ledger = ledger().await;
        ledger
            .create(submission("T1", Platform::Sora), &json!({"status": "queued"}))
            .await
            .unwrap();

        let completed = json!({
            "status": "completed",
            "video_url": "https://evil.example/x.mp4"
        });
        assert!(matches!(
            ledger.reconcile("u2", "T1", Platform::Sora, &completed).await,
            Err(LedgerError::NotFound(_))
        ));

        let record = ledger.find_by_external_id("T1").await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Queued);
        assert!(record.video_url.is_none());
    }
}
