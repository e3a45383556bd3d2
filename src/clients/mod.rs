//! HTTP clients for the generative-media providers.
//!
//! All clients share one pooled [`reqwest::Client`] and take the endpoint per
//! call, since the effective server and key differ between users.

pub mod error;
pub mod gemini;
pub mod grok_image;
pub mod sora;
pub mod videos;

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::debug;
use url::Url;

pub use error::ProviderError;

/// Base URL plus bearer key for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub server: String,
    pub key: String,
}

impl Endpoint {
    pub fn new(server: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            key: key.into(),
        }
    }

    /// Appends path segments to the server URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url =
            Url::parse(self.server.trim()).map_err(|_| ProviderError::invalid_endpoint(&self.server))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::invalid_endpoint(&self.server))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// An image pulled out of a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    /// Base64 payload returned inline.
    Inline { mime_type: String, data: String },
    /// Hosted by the provider.
    Remote { url: String },
}

/// Sends a request with the bearer key and decodes a JSON body.
pub(crate) async fn send_json(
    request: RequestBuilder,
    endpoint: &Endpoint,
) -> Result<Value, ProviderError> {
    let response = request
        .bearer_auth(&endpoint.key)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ProviderError::transport(&e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::transport(&e))?;

    if !status.is_success() {
        debug!(status = status.as_u16(), body = %body, "Provider returned an error");
        return Err(ProviderError::from_response(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| ProviderError {
        status: Some(status.as_u16()),
        message: format!("Provider returned invalid JSON: {e}"),
        details: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let ep = Endpoint::new("https://api.example.com/", "k");
        assert_eq!(
            ep.url(&["v1", "videos", "a/b c"]).unwrap().as_str(),
            "https://api.example.com/v1/videos/a%2Fb%20c"
        );

        let ep = Endpoint::new("https://api.example.com/proxy", "k");
        assert_eq!(
            ep.url(&["v1beta", "models", "gemini-3:generateContent"])
                .unwrap()
                .as_str(),
            "https://api.example.com/proxy/v1beta/models/gemini-3:generateContent"
        );

        assert!(Endpoint::new("not a url", "k").url(&["x"]).is_err());
    }
}
