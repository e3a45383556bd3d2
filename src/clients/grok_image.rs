use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

use super::{Endpoint, GeneratedImage, ProviderError, send_json};

pub const DEFAULT_SIZE: &str = "1024x1024";

#[must_use]
pub fn build_payload(model: &str, prompt: &str, n: u32, size: &str) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "n": n.max(1),
        "size": size,
        "response_format": "b64_json",
    })
}

/// Reads `data[]`, preferring inline base64 over hosted URLs.
#[must_use]
pub fn extract_images(response: &Value) -> Vec<GeneratedImage> {
    let Some(data) = response.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    data.iter()
        .filter_map(|item| {
            if let Some(b64) = item.get("b64_json").and_then(Value::as_str) {
                return Some(GeneratedImage::Inline {
                    mime_type: "image/png".to_string(),
                    data: b64.to_string(),
                });
            }
            item.get("url")
                .and_then(Value::as_str)
                .map(|url| GeneratedImage::Remote {
                    url: url.to_string(),
                })
        })
        .collect()
}

#[derive(Clone)]
pub struct GrokImageClient {
    http: Client,
    timeout: Duration,
}

impl GrokImageClient {
    #[must_use]
    pub const fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub async fn generate(&self, endpoint: &Endpoint, payload: &Value) -> Result<Value, ProviderError> {
        let url = endpoint.url(&["v1", "images", "generations"])?;
        info!(model = %payload["model"], "Requesting Grok image generation");

        let builder = self.http.post(url).timeout(self.timeout).json(payload);
        send_json(builder, endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract() {
        let images = extract_images(&json!({
            "data": [{"b64_json": "QUJD"}, {"url": "https://cdn/x.png"}, {"revised_prompt": "x"}]
        }));
        assert_eq!(images.len(), 2);
        assert_eq!(
            images[1],
            GeneratedImage::Remote {
                url: "https://cdn/x.png".to_string()
            }
        );
    }

    #[test]
    fn test_payload() {
        let payload = build_payload("grok-2-image", "a cat", 0, DEFAULT_SIZE);
        assert_eq!(payload["n"], 1);
        assert_eq!(payload["response_format"], "b64_json");
    }
}
