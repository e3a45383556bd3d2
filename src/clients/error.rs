use serde_json::Value;
use std::fmt;

/// A failed provider call.
///
/// `status` is the provider's HTTP status when it answered at all, and
/// `details` its JSON error body when it sent one.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
    pub details: Option<Value>,
}

impl ProviderError {
    pub fn transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "Provider request timed out".to_string()
        } else if err.is_connect() {
            "Could not connect to provider".to_string()
        } else {
            format!("Provider request failed: {err}")
        };

        Self {
            status: err.status().map(|s| s.as_u16()),
            message,
            details: None,
        }
    }

    pub fn invalid_endpoint(server: &str) -> Self {
        Self {
            status: None,
            message: format!("Invalid provider server URL: {server}"),
            details: None,
        }
    }

    /// Builds the error for a non-2xx response, pulling the most specific
    /// message the body offers.
    pub fn from_response(status: u16, body: &str) -> Self {
        let details = serde_json::from_str::<Value>(body).ok();
        let message = details
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| format!("Provider returned HTTP {status}"));

        Self {
            status: Some(status),
            message,
            details,
        }
    }
}

fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.and_then(Value::as_str))
        .or_else(|| body.get("message").and_then(Value::as_str))
        .or_else(|| body.get("detail").and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(ToString::to_string)
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_extraction() {
        let err = ProviderError::from_response(400, r#"{"error":{"message":"bad size"}}"#);
        assert_eq!(err.message, "bad size");
        assert_eq!(err.status, Some(400));
        assert!(err.details.is_some());

        let err = ProviderError::from_response(401, r#"{"error":"invalid key"}"#);
        assert_eq!(err.message, "invalid key");

        let err = ProviderError::from_response(502, "<html>gateway</html>");
        assert_eq!(err.message, "Provider returned HTTP 502");
        assert!(err.details.is_none());
    }
}
