use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

use super::{Endpoint, ProviderError, send_json};

pub const DEFAULT_MODEL: &str = "sora-2";

/// Body accepted by the Sora create route. Absent fields take the
/// provider defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoraCreateRequest {
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub orientation: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub watermark: Option<bool>,
    #[serde(default)]
    pub private: Option<bool>,
}

impl SoraCreateRequest {
    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }

    /// Provider payload with defaults filled in.
    #[must_use]
    pub fn payload(&self) -> Value {
        json!({
            "images": self.images.clone().unwrap_or_default(),
            "model": self.model(),
            "orientation": self.orientation.as_deref().unwrap_or("landscape"),
            "prompt": self.prompt,
            "size": self.size.as_deref().unwrap_or("small"),
            "duration": self.duration.unwrap_or(10),
            "watermark": self.watermark.unwrap_or(true),
            "private": self.private.unwrap_or(false),
        })
    }

    /// Parameters kept on the task record.
    #[must_use]
    pub fn params(&self) -> Value {
        json!({
            "orientation": self.orientation,
            "size": self.size,
            "duration": self.duration,
            "watermark": self.watermark,
            "imageCount": self.images.as_ref().map_or(0, Vec::len),
        })
    }
}

/// Cameo character extraction from an existing video or finished task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamps: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_task: Option<String>,
}

#[derive(Clone)]
pub struct SoraClient {
    http: Client,
    timeout: Duration,
}

impl SoraClient {
    #[must_use]
    pub const fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub async fn create_video(
        &self,
        endpoint: &Endpoint,
        request: &SoraCreateRequest,
    ) -> Result<Value, ProviderError> {
        let url = endpoint.url(&["v1", "video", "create"])?;
        info!(model = %request.model(), url = %url, "Submitting Sora video");

        let builder = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&request.payload());
        send_json(builder, endpoint).await
    }

    pub async fn query_video(&self, endpoint: &Endpoint, id: &str) -> Result<Value, ProviderError> {
        let url = endpoint.url(&["v1", "videos", id])?;
        let builder = self.http.get(url).timeout(self.timeout);
        send_json(builder, endpoint).await
    }

    pub async fn create_character(
        &self,
        endpoint: &Endpoint,
        request: &CharacterRequest,
    ) -> Result<Value, ProviderError> {
        let url = endpoint.url(&["sora", "v1", "characters"])?;
        info!(timestamps = %request.timestamps, url = %url, "Creating Sora character");

        let builder = self.http.post(url).timeout(self.timeout).json(request);
        send_json(builder, endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults() {
        let request = SoraCreateRequest {
            prompt: "a fox".to_string(),
            ..SoraCreateRequest::default()
        };
        let payload = request.payload();

        assert_eq!(payload["model"], "sora-2");
        assert_eq!(payload["orientation"], "landscape");
        assert_eq!(payload["size"], "small");
        assert_eq!(payload["duration"], 10);
        assert_eq!(payload["watermark"], true);
        assert_eq!(payload["private"], false);
        assert_eq!(payload["images"], json!([]));
    }

    #[test]
    fn test_payload_keeps_explicit_values() {
        let request: SoraCreateRequest = serde_json::from_value(json!({
            "prompt": "p",
            "model": "sora-2-pro",
            "orientation": "portrait",
            "duration": 15,
            "watermark": false
        }))
        .unwrap();
        let payload = request.payload();

        assert_eq!(payload["model"], "sora-2-pro");
        assert_eq!(payload["orientation"], "portrait");
        assert_eq!(payload["duration"], 15);
        assert_eq!(payload["watermark"], false);
    }
}
