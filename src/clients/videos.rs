//! OpenAI-style `/v1/videos` endpoints, used by both VEO and Grok.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::{Endpoint, ProviderError, send_json};

/// An uploaded reference image forwarded to the provider as-is.
#[derive(Debug, Clone)]
pub struct ReferenceFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields and reference files for a multipart create call.
#[derive(Debug, Clone, Default)]
pub struct VideoForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<ReferenceFile>,
}

impl VideoForm {
    pub fn field(&mut self, name: &str, value: impl Into<String>) {
        self.fields.push((name.to_string(), value.into()));
    }

    fn into_multipart(self) -> Result<Form, ProviderError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }

        for file in self.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| ProviderError {
                    status: Some(400),
                    message: format!("Invalid reference file type '{}': {e}", file.content_type),
                    details: None,
                })?;
            form = form.part("input_reference", part);
        }

        Ok(form)
    }
}

#[derive(Clone)]
pub struct VideoJobsClient {
    http: Client,
    upload_timeout: Duration,
    query_timeout: Duration,
}

impl VideoJobsClient {
    #[must_use]
    pub const fn new(http: Client, upload_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            http,
            upload_timeout,
            query_timeout,
        }
    }

    pub async fn create(&self, endpoint: &Endpoint, form: VideoForm) -> Result<Value, ProviderError> {
        let url = endpoint.url(&["v1", "videos"])?;
        info!(url = %url, references = form.files.len(), "Submitting video job");

        let builder = self
            .http
            .post(url)
            .timeout(self.upload_timeout)
            .multipart(form.into_multipart()?);
        send_json(builder, endpoint).await
    }

    pub async fn query(&self, endpoint: &Endpoint, id: &str) -> Result<Value, ProviderError> {
        let url = endpoint.url(&["v1", "videos", id])?;
        let builder = self.http.get(url).timeout(self.query_timeout);
        send_json(builder, endpoint).await
    }
}
