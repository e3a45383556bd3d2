#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use mediagate::api::AppState;
use mediagate::config::Config;
use mediagate::services::BootstrapCredentials;
use serde_json::{Value, json};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    admin: BootstrapCredentials,
    pub uploads: std::path::PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads);
    }
}

pub async fn spawn_app() -> TestApp {
    let uploads = std::env::temp_dir().join(format!("mediagate-test-{}", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.uploads_path = uploads.to_string_lossy().into_owned();
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.security.argon2_parallelism = 1;

    let state = mediagate::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    let admin = state
        .shared
        .auth
        .bootstrap_admin()
        .await
        .expect("bootstrap failed")
        .expect("fresh database has no users");
    let router = mediagate::api::router(state.clone());

    TestApp {
        router,
        state,
        admin,
        uploads,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self.send(builder.body(Body::empty()).unwrap()).await;
        split(response).await
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .send(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        split(response).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        split(self.send(request).await).await
    }

    /// Posts `multipart/form-data`. Files are `(field, file name, content type, bytes)`.
    pub async fn multipart(
        &self,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &str, &[u8])],
    ) -> (StatusCode, Value) {
        const BOUNDARY: &str = "mediagate-test-boundary";

        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, file_name, content_type, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        split(self.send(request).await).await
    }

    /// Registers a user and returns their token.
    pub async fn register(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/v1/auth/register",
                None,
                &json!({"username": username, "password": password}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Logs in as the bootstrapped admin.
    pub async fn admin_token(&self) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/v1/auth/login",
                None,
                &json!({"username": self.admin.username, "password": self.admin.password}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }
}

pub async fn split(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
