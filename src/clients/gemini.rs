use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

use super::{Endpoint, GeneratedImage, ProviderError, send_json};

pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
pub const DEFAULT_IMAGE_SIZE: &str = "1K";

/// Reference image sent inline with the prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// `generateContent` payload asking for text and image output.
#[must_use]
pub fn build_payload(
    prompt: &str,
    references: &[InlineImage],
    aspect_ratio: &str,
    image_size: &str,
) -> Value {
    let mut parts = Vec::with_capacity(references.len() + 1);
    if !prompt.is_empty() {
        parts.push(json!({ "text": prompt }));
    }
    for image in references {
        parts.push(json!({
            "inline_data": { "mime_type": image.mime_type, "data": image.data }
        }));
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": { "aspectRatio": aspect_ratio, "imageSize": image_size }
        }
    })
}

/// Walks candidates → content → parts and collects inline image data.
/// Both `inlineData` and `inline_data` spellings occur in the wild.
#[must_use]
pub fn extract_images(response: &Value) -> Vec<GeneratedImage> {
    let Some(candidates) = response.get("candidates").and_then(Value::as_array) else {
        return Vec::new();
    };

    candidates
        .iter()
        .filter_map(|c| c.pointer("/content/parts").and_then(Value::as_array))
        .flatten()
        .filter_map(|part| part.get("inlineData").or_else(|| part.get("inline_data")))
        .filter_map(|inline| {
            let data = inline.get("data").and_then(Value::as_str)?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            Some(GeneratedImage::Inline {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    timeout: Duration,
}

impl GeminiClient {
    #[must_use]
    pub const fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub async fn generate(
        &self,
        endpoint: &Endpoint,
        model: &str,
        payload: &Value,
    ) -> Result<Value, ProviderError> {
        let method = format!("{model}:generateContent");
        let url = endpoint.url(&["v1beta", "models", &method])?;
        info!(model = %model, "Requesting Gemini image generation");

        let builder = self.http.post(url).timeout(self.timeout).json(payload);
        send_json(builder, endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = build_payload(
            "a red kite",
            &[InlineImage {
                mime_type: "image/png".to_string(),
                data: "AAAA".to_string(),
            }],
            "16:9",
            "2K",
        );

        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "a red kite");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(payload["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(payload["generationConfig"]["responseModalities"][1], "IMAGE");
    }

    #[test]
    fn test_extract_both_spellings() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "image/jpeg", "data": "QUJD"}},
                    {"inline_data": {"mime_type": "image/webp", "data": "REVG"}}
                ]}
            }]
        });

        let images = extract_images(&response);
        assert_eq!(images.len(), 2);
        assert_eq!(
            images[0],
            GeneratedImage::Inline {
                mime_type: "image/jpeg".to_string(),
                data: "QUJD".to_string()
            }
        );
        assert!(extract_images(&json!({"candidates": []})).is_empty());
    }
}
