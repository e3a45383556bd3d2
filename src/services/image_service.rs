//! Image generation through Gemini or Grok-image.
//!
//! The async variant records a task, hands the provider call to the
//! background supervisor and returns at once; the job stores the resulting
//! images under the uploads directory and completes or fails the task.

use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::gemini::{self, GeminiClient, InlineImage};
use crate::clients::grok_image::{self, GrokImageClient};
use crate::clients::{Endpoint, GeneratedImage, ProviderError};
use crate::db::{NewImageTask, Store};
use crate::entities::image_tasks;
use crate::models::{AuthUser, Provider, TaskStatus};
use crate::services::assets::{AssetStore, StoredImage};
use crate::services::background::BackgroundTasks;
use crate::services::config_service::{ConfigError, ConfigService};

pub const MAX_REFERENCE_IMAGES: usize = 5;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("No server configured for {0}")]
    NotConfigured(Provider),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to store image: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ImageError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageRequest {
    pub model: Option<String>,
    pub prompt: String,
    #[serde(alias = "aspect_ratio")]
    pub aspect_ratio: Option<String>,
    #[serde(alias = "image_size")]
    pub image_size: Option<String>,
    /// Pixel size for Grok-image models.
    pub size: Option<String>,
    pub n: Option<u32>,
    #[serde(skip)]
    pub reference_images: Vec<InlineImage>,
}

impl ImageRequest {
    fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(gemini::DEFAULT_MODEL)
    }

    fn aspect_ratio(&self) -> &str {
        self.aspect_ratio
            .as_deref()
            .unwrap_or(gemini::DEFAULT_ASPECT_RATIO)
    }

    fn image_size(&self) -> &str {
        self.image_size
            .as_deref()
            .unwrap_or(gemini::DEFAULT_IMAGE_SIZE)
    }

    fn validate(&self) -> Result<(), ImageError> {
        if self.prompt.trim().is_empty() {
            return Err(ImageError::Validation("prompt is required".to_string()));
        }
        if self.reference_images.len() > MAX_REFERENCE_IMAGES {
            return Err(ImageError::Validation(format!(
                "At most {MAX_REFERENCE_IMAGES} reference images are allowed"
            )));
        }
        Ok(())
    }
}

/// `grok*` and `gpt*` models go to Grok-image, everything else to Gemini.
#[must_use]
pub fn provider_for_model(model: &str) -> Provider {
    let model = model.to_ascii_lowercase();
    if model.starts_with("grok") || model.starts_with("gpt") {
        Provider::GrokImage
    } else {
        Provider::GeminiImage
    }
}

/// Everything a detached generation job needs.
#[derive(Clone)]
struct ImageWorker {
    store: Store,
    gemini: GeminiClient,
    grok: GrokImageClient,
    assets: AssetStore,
}

impl ImageWorker {
    /// Calls the provider and stores every returned image.
    async fn generate(
        &self,
        user_id: &str,
        task_id: &str,
        provider: Provider,
        endpoint: &Endpoint,
        request: &ImageRequest,
    ) -> Result<(Vec<StoredImage>, Value), ImageError> {
        let (raw, generated) = match provider {
            Provider::GrokImage => {
                let payload = grok_image::build_payload(
                    request.model(),
                    &request.prompt,
                    request.n.unwrap_or(1),
                    request.size.as_deref().unwrap_or(grok_image::DEFAULT_SIZE),
                );
                let raw = self.grok.generate(endpoint, &payload).await?;
                let images = grok_image::extract_images(&raw);
                (raw, images)
            }
            _ => {
                let payload = gemini::build_payload(
                    &request.prompt,
                    &request.reference_images,
                    request.aspect_ratio(),
                    request.image_size(),
                );
                let raw = self
                    .gemini
                    .generate(endpoint, request.model(), &payload)
                    .await?;
                let images = gemini::extract_images(&raw);
                (raw, images)
            }
        };

        let mut stored = Vec::with_capacity(generated.len());
        for (index, image) in generated.into_iter().enumerate() {
            let saved = match image {
                GeneratedImage::Inline { mime_type, data } => self
                    .assets
                    .save_base64_image(user_id, task_id, index, &data, Some(&mime_type))
                    .await
                    .map_err(|e| ImageError::Storage(format!("{e:#}")))?,
                GeneratedImage::Remote { url } => StoredImage {
                    mime_type: "image/png".to_string(),
                    url,
                },
            };
            stored.push(saved);
        }

        Ok((stored, raw))
    }

    /// Body of the detached job. Provider and storage failures end up on the
    /// task row; only a failed database write escapes to the supervisor.
    async fn run(
        self,
        user_id: String,
        task_id: String,
        provider: Provider,
        endpoint: Endpoint,
        request: ImageRequest,
    ) -> anyhow::Result<()> {
        let outcome = self
            .generate(&user_id, &task_id, provider, &endpoint, &request)
            .await;

        match outcome {
            Ok((images, _)) if !images.is_empty() => {
                info!(task_id = %task_id, count = images.len(), "Image task completed");
                self.store
                    .complete_image_task(&task_id, &serde_json::to_value(&images)?)
                    .await?;
                metrics::counter!("image_tasks_total", "status" => "completed").increment(1);
            }
            Ok(_) => {
                warn!(task_id = %task_id, "Provider returned no images");
                self.store
                    .fail_image_task(&task_id, "No images generated")
                    .await?;
                metrics::counter!("image_tasks_total", "status" => "failed").increment(1);
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Image task failed");
                self.store.fail_image_task(&task_id, &e.to_string()).await?;
                metrics::counter!("image_tasks_total", "status" => "failed").increment(1);
            }
        }
        Ok(())
    }
}

pub struct ImageService {
    config: Arc<dyn ConfigService>,
    background: BackgroundTasks,
    worker: ImageWorker,
}

impl ImageService {
    pub fn new(
        config: Arc<dyn ConfigService>,
        store: Store,
        gemini: GeminiClient,
        grok: GrokImageClient,
        assets: AssetStore,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            config,
            background,
            worker: ImageWorker {
                store,
                gemini,
                grok,
                assets,
            },
        }
    }

    async fn endpoint(&self, user_id: &str, provider: Provider) -> Result<Endpoint, ImageError> {
        let settings = self.config.effective_config(user_id, provider).await?;
        if !settings.is_configured() {
            return Err(ImageError::NotConfigured(provider));
        }
        Ok(Endpoint::new(settings.server, settings.key))
    }

    /// Records a task and generates in the background.
    pub async fn create(&self, user: &AuthUser, request: ImageRequest) -> Result<Value, ImageError> {
        request.validate()?;
        let provider = provider_for_model(request.model());
        let endpoint = self.endpoint(&user.user_id, provider).await?;

        let task_id = Uuid::new_v4().to_string();
        self.worker
            .store
            .insert_image_task(NewImageTask {
                task_id: task_id.clone(),
                user_id: user.user_id.clone(),
                provider: provider.as_str().to_string(),
                model: request.model().to_string(),
                prompt: request.prompt.clone(),
                aspect_ratio: request.aspect_ratio().to_string(),
                image_size: request.image_size().to_string(),
            })
            .await?;

        info!(task_id = %task_id, provider = %provider, "Image task created");

        let job = self.worker.clone().run(
            user.user_id.clone(),
            task_id.clone(),
            provider,
            endpoint,
            request,
        );
        self.background.spawn("image_generation", job);

        Ok(json!({ "id": task_id, "status": TaskStatus::Processing }))
    }

    /// Generates and waits for the result.
    pub async fn generate(&self, user: &AuthUser, request: ImageRequest) -> Result<Value, ImageError> {
        request.validate()?;
        let provider = provider_for_model(request.model());
        let endpoint = self.endpoint(&user.user_id, provider).await?;

        let run_id = Uuid::new_v4().to_string();
        let (images, raw) = self
            .worker
            .generate(&user.user_id, &run_id, provider, &endpoint, &request)
            .await?;

        let status = if images.is_empty() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        Ok(json!({ "status": status, "images": images, "raw": raw }))
    }

    /// Task state for the calling user, or a `not_found` marker.
    pub async fn query(&self, user: &AuthUser, task_id: &str) -> Result<Value, ImageError> {
        let Some(task) = self.worker.store.get_image_task(&user.user_id, task_id).await? else {
            return Ok(json!({
                "id": task_id,
                "status": "not_found",
                "error": "Task not found",
            }));
        };
        Ok(task_view(&task))
    }
}

#[must_use]
pub fn task_view(task: &image_tasks::Model) -> Value {
    let mut view = json!({
        "id": task.task_id,
        "status": task.status,
        "provider": task.provider,
        "prompt": task.prompt,
        "model": task.model,
        "aspectRatio": task.aspect_ratio,
        "imageSize": task.image_size,
        "createdAt": task.created_at,
        "updatedAt": task.updated_at,
    });

    if task.status == TaskStatus::Completed.as_str() {
        view["images"] = serde_json::from_str(&task.images).unwrap_or_else(|_| json!([]));
    }
    if let Some(error) = &task.error {
        view["error"] = json!(error);
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_routing() {
        assert_eq!(provider_for_model("grok-2-image"), Provider::GrokImage);
        assert_eq!(provider_for_model("GPT-image-1"), Provider::GrokImage);
        assert_eq!(
            provider_for_model("gemini-3-pro-image-preview"),
            Provider::GeminiImage
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: ImageRequest =
            serde_json::from_value(json!({"prompt": "a hill", "aspectRatio": "16:9"})).unwrap();
        assert_eq!(request.model(), gemini::DEFAULT_MODEL);
        assert_eq!(request.aspect_ratio(), "16:9");
        assert_eq!(request.image_size(), "1K");
        assert!(request.validate().is_ok());

        let empty = ImageRequest::default();
        assert!(empty.validate().is_err());
    }
}
