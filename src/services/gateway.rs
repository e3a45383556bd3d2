//! Video request gateway.
//!
//! Resolves the caller's effective provider config, forwards the request,
//! and keeps the task ledger in step. Ledger writes are best effort: a
//! provider response is never lost because bookkeeping failed.

use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::clients::sora::{CharacterRequest, SoraClient, SoraCreateRequest};
use crate::clients::videos::{ReferenceFile, VideoForm, VideoJobsClient};
use crate::clients::{Endpoint, ProviderError};
use crate::models::{AuthUser, Platform, Provider};
use crate::services::config_service::{ConfigError, ConfigService};
use crate::services::task_ledger::{LedgerError, TaskLedger, TaskSubmission};

pub const MAX_REFERENCE_FILES: usize = 10;

const VEO_DEFAULT_MODEL: &str = "veo_3_1-fast";
const VEO_SIZES: &[&str] = &["720x1280", "1280x720"];
const GROK_DEFAULT_MODEL: &str = "grok-video-3";
const GROK_ASPECT_RATIOS: &[&str] = &["2:3", "3:2", "1:1"];
const GROK_SIZES: &[&str] = &["720P", "1080P"];

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No server configured for {0}")]
    NotConfigured(Provider),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Multipart create request for VEO or Grok.
#[derive(Debug, Clone, Default)]
pub struct VideoJobRequest {
    pub model: Option<String>,
    pub prompt: String,
    pub size: Option<String>,
    pub seconds: Option<u32>,
    pub aspect_ratio: Option<String>,
    pub files: Vec<ReferenceFile>,
}

/// Per-platform defaults and accepted values for multipart jobs.
#[derive(Debug, Clone, Copy)]
struct JobRules {
    default_model: &'static str,
    sizes: &'static [&'static str],
    aspect_ratios: &'static [&'static str],
}

const fn job_rules(platform: Platform) -> Option<JobRules> {
    match platform {
        Platform::Veo => Some(JobRules {
            default_model: VEO_DEFAULT_MODEL,
            sizes: VEO_SIZES,
            aspect_ratios: &[],
        }),
        Platform::Grok => Some(JobRules {
            default_model: GROK_DEFAULT_MODEL,
            sizes: GROK_SIZES,
            aspect_ratios: GROK_ASPECT_RATIOS,
        }),
        Platform::Sora => None,
    }
}

impl VideoJobRequest {
    fn model(&self, rules: JobRules) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| rules.default_model.to_string())
    }

    fn validate(&self, platform: Platform) -> Result<JobRules, GatewayError> {
        let Some(rules) = job_rules(platform) else {
            return Err(GatewayError::Validation(format!(
                "{platform} does not accept multipart jobs"
            )));
        };
        if self.prompt.trim().is_empty() {
            return Err(GatewayError::Validation("prompt is required".to_string()));
        }
        if self.files.len() > MAX_REFERENCE_FILES {
            return Err(GatewayError::Validation(format!(
                "At most {MAX_REFERENCE_FILES} reference images are allowed"
            )));
        }

        if self.size.as_deref().is_some_and(|s| !rules.sizes.contains(&s)) {
            return Err(GatewayError::Validation(format!(
                "size must be one of: {}",
                rules.sizes.join(", ")
            )));
        }
        if let Some(ratio) = self.aspect_ratio.as_deref() {
            if rules.aspect_ratios.is_empty() {
                return Err(GatewayError::Validation(format!(
                    "aspect_ratio is not supported for {platform}"
                )));
            }
            if !rules.aspect_ratios.contains(&ratio) {
                return Err(GatewayError::Validation(format!(
                    "aspect_ratio must be one of: {}",
                    rules.aspect_ratios.join(", ")
                )));
            }
        }
        Ok(rules)
    }

    fn params(&self) -> Value {
        json!({
            "size": self.size,
            "seconds": self.seconds,
            "aspect_ratio": self.aspect_ratio,
            "hasReferenceImages": !self.files.is_empty(),
        })
    }

    fn into_form(self, model: &str) -> VideoForm {
        let mut form = VideoForm::default();
        form.field("model", model);
        form.field("prompt", self.prompt);
        if let Some(ratio) = self.aspect_ratio {
            form.field("aspect_ratio", ratio);
        }
        if let Some(seconds) = self.seconds {
            form.field("seconds", seconds.to_string());
        }
        if let Some(size) = self.size {
            form.field("size", size);
        }
        form.files = self.files;
        form
    }
}

pub struct VideoGateway {
    config: Arc<dyn ConfigService>,
    ledger: Arc<dyn TaskLedger>,
    sora: SoraClient,
    jobs: VideoJobsClient,
}

impl VideoGateway {
    pub fn new(
        config: Arc<dyn ConfigService>,
        ledger: Arc<dyn TaskLedger>,
        sora: SoraClient,
        jobs: VideoJobsClient,
    ) -> Self {
        Self {
            config,
            ledger,
            sora,
            jobs,
        }
    }

    async fn endpoint(&self, user_id: &str, provider: Provider) -> Result<Endpoint, GatewayError> {
        let settings = self.config.effective_config(user_id, provider).await?;
        if !settings.is_configured() {
            return Err(GatewayError::NotConfigured(provider));
        }
        Ok(Endpoint::new(settings.server, settings.key))
    }

    async fn record(&self, submission: TaskSubmission, response: &Value) {
        if submission.external_id.is_empty() {
            warn!(platform = %submission.platform, "Provider response carried no task id, not recorded");
            return;
        }
        if let Err(e) = self.ledger.create(submission, response).await {
            warn!(error = %e, "Failed to record video task");
        }
    }

    async fn reconcile(&self, user_id: &str, id: &str, platform: Platform, response: &Value) {
        match self.ledger.reconcile(user_id, id, platform, response).await {
            Ok(_) => {}
            Err(LedgerError::NotFound(_)) => {
                info!(
                    task_id = %id,
                    platform = %platform,
                    "Queried task is not in the caller's ledger, skipping update"
                );
            }
            Err(e) => warn!(task_id = %id, error = %e, "Failed to reconcile video task"),
        }
    }

    pub async fn create_sora(
        &self,
        user: &AuthUser,
        request: &SoraCreateRequest,
    ) -> Result<Value, GatewayError> {
        if request.prompt.trim().is_empty() {
            return Err(GatewayError::Validation("prompt is required".to_string()));
        }

        let endpoint = self.endpoint(&user.user_id, Provider::Sora).await?;
        let response = self.sora.create_video(&endpoint, request).await?;
        metrics::counter!("video_tasks_created_total", "platform" => "sora").increment(1);

        self.record(
            TaskSubmission {
                user_id: user.user_id.clone(),
                external_id: task_id_of(&response),
                platform: Platform::Sora,
                model: request.model().to_string(),
                prompt: request.prompt.clone(),
                params: request.params(),
            },
            &response,
        )
        .await;

        Ok(response)
    }

    pub async fn create_character(
        &self,
        user: &AuthUser,
        request: &CharacterRequest,
    ) -> Result<Value, GatewayError> {
        if request.timestamps.trim().is_empty() {
            return Err(GatewayError::Validation("timestamps is required".to_string()));
        }
        if request.url.is_none() && request.from_task.is_none() {
            return Err(GatewayError::Validation(
                "Either url or from_task is required".to_string(),
            ));
        }

        let settings = self
            .config
            .effective_config(&user.user_id, Provider::Sora)
            .await?;
        let (server, key) = settings.character_endpoint();
        if server.is_empty() {
            return Err(GatewayError::NotConfigured(Provider::Sora));
        }

        Ok(self
            .sora
            .create_character(&Endpoint::new(server, key), request)
            .await?)
    }

    /// Multipart create for VEO or Grok.
    pub async fn create_job(
        &self,
        user: &AuthUser,
        platform: Platform,
        request: VideoJobRequest,
    ) -> Result<Value, GatewayError> {
        let rules = request.validate(platform)?;
        let provider = provider_for(platform);

        let endpoint = self.endpoint(&user.user_id, provider).await?;
        let model = request.model(rules);
        let prompt = request.prompt.clone();
        let params = request.params();

        let response = self
            .jobs
            .create(&endpoint, request.into_form(&model))
            .await?;
        metrics::counter!("video_tasks_created_total", "platform" => platform.as_str())
            .increment(1);

        self.record(
            TaskSubmission {
                user_id: user.user_id.clone(),
                external_id: task_id_of(&response),
                platform,
                model,
                prompt,
                params,
            },
            &response,
        )
        .await;

        Ok(response)
    }

    /// Re-queries the provider and reconciles the ledger.
    pub async fn query(
        &self,
        user: &AuthUser,
        platform: Platform,
        id: &str,
    ) -> Result<Value, GatewayError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(GatewayError::Validation("id is required".to_string()));
        }

        let endpoint = self.endpoint(&user.user_id, provider_for(platform)).await?;
        let response = match platform {
            Platform::Sora => self.sora.query_video(&endpoint, id).await?,
            Platform::Veo | Platform::Grok => self.jobs.query(&endpoint, id).await?,
        };

        self.reconcile(&user.user_id, id, platform, &response).await;
        Ok(response)
    }
}

const fn provider_for(platform: Platform) -> Provider {
    match platform {
        Platform::Sora => Provider::Sora,
        Platform::Veo => Provider::Veo,
        Platform::Grok => Provider::Grok,
    }
}

/// Providers return the id as `id` or `task_id`, as a string or a number.
fn task_id_of(response: &Value) -> String {
    ["id", "task_id"]
        .iter()
        .filter_map(|k| response.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_extraction() {
        assert_eq!(task_id_of(&json!({"id": "T1"})), "T1");
        assert_eq!(task_id_of(&json!({"task_id": 42})), "42");
        assert_eq!(task_id_of(&json!({"id": ""})), "");
    }

    fn validation_message(result: Result<JobRules, GatewayError>) -> String {
        match result {
            Err(GatewayError::Validation(message)) => message,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_job_validation() {
        let mut request = VideoJobRequest {
            prompt: "p".to_string(),
            aspect_ratio: Some("3:2".to_string()),
            size: Some("1080P".to_string()),
            ..VideoJobRequest::default()
        };
        assert!(request.validate(Platform::Grok).is_ok());
        // VEO takes pixel sizes and no aspect ratio.
        assert!(request.validate(Platform::Veo).is_err());

        request.aspect_ratio = Some("16:9".to_string());
        assert_eq!(
            validation_message(request.validate(Platform::Grok)),
            "aspect_ratio must be one of: 2:3, 3:2, 1:1"
        );

        let too_many = VideoJobRequest {
            prompt: "p".to_string(),
            files: vec![
                ReferenceFile {
                    file_name: "a.png".to_string(),
                    content_type: "image/png".to_string(),
                    bytes: Vec::new(),
                };
                11
            ],
            ..VideoJobRequest::default()
        };
        assert!(too_many.validate(Platform::Veo).is_err());
    }

    #[test]
    fn test_veo_rejects_aspect_ratio_without_listing_grok_values() {
        let request = VideoJobRequest {
            prompt: "p".to_string(),
            size: Some("1280x720".to_string()),
            aspect_ratio: Some("2:3".to_string()),
            ..VideoJobRequest::default()
        };
        assert_eq!(
            validation_message(request.validate(Platform::Veo)),
            "aspect_ratio is not supported for veo"
        );

        let sized = VideoJobRequest {
            aspect_ratio: None,
            ..request
        };
        assert!(sized.validate(Platform::Veo).is_ok());
    }

    #[test]
    fn test_sora_is_not_a_multipart_platform() {
        let request = VideoJobRequest {
            prompt: "p".to_string(),
            ..VideoJobRequest::default()
        };
        assert!(job_rules(Platform::Sora).is_none());
        assert_eq!(
            validation_message(request.validate(Platform::Sora)),
            "sora does not accept multipart jobs"
        );
    }

    #[test]
    fn test_default_models() {
        let request = VideoJobRequest::default();
        let veo = job_rules(Platform::Veo).unwrap();
        let grok = job_rules(Platform::Grok).unwrap();
        assert_eq!(request.model(veo), "veo_3_1-fast");
        assert_eq!(request.model(grok), "grok-video-3");
    }
}
