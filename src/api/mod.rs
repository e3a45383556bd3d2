use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

mod admin;
pub mod auth;
mod error;
mod feedback;
mod image;
mod observability;
mod provider_config;
mod tasks;
mod types;
mod upload;
mod validation;
mod video;

pub use error::ApiError;
pub use types::*;

use crate::services::{
    AdminService, AuthService, BackgroundTasks, ConfigService, FeedbackService, ImageService,
    TaskLedger, VerificationService, VideoGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;

/// Multipart uploads carry up to ten reference images.
const BODY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth
    }

    #[must_use]
    pub fn provider_config(&self) -> &Arc<dyn ConfigService> {
        &self.shared.provider_config
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn TaskLedger> {
        &self.shared.ledger
    }

    #[must_use]
    pub fn gateway(&self) -> &VideoGateway {
        &self.shared.gateway
    }

    #[must_use]
    pub fn images(&self) -> &ImageService {
        &self.shared.images
    }

    #[must_use]
    pub fn verification(&self) -> &VerificationService {
        &self.shared.verification
    }

    #[must_use]
    pub fn feedback(&self) -> &FeedbackService {
        &self.shared.feedback
    }

    #[must_use]
    pub fn admin(&self) -> &AdminService {
        &self.shared.admin
    }

    #[must_use]
    pub fn background(&self) -> &BackgroundTasks {
        &self.shared.background
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let (uploads_path, cors_origins) = {
        let config = state.config();
        (
            config.server.uploads_path.clone(),
            config.server.cors_allowed_origins.clone(),
        )
    };

    let api_router = Router::new()
        .merge(create_protected_router(state.clone()))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/code/send", post(auth::send_code))
        .route("/auth/code/verify", post(auth::verify_code));

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    let mut root = Router::new()
        .nest("/v1", api_router)
        .route("/health", get(observability::health));

    if state.prometheus_handle.is_some() {
        root = root.route("/metrics", get(observability::get_metrics));
    }

    root.with_state(state)
        .nest_service(
            crate::services::assets::PUBLIC_PREFIX,
            tower_http::services::ServeDir::new(uploads_path),
        )
        .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin_routes = Router::new()
        .route("/config/full", get(provider_config::get_global_config_full))
        .route("/config", put(provider_config::update_global_config))
        .route("/config/{service}", put(provider_config::update_global_provider))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}", get(admin::get_user))
        .route(
            "/admin/users/{user_id}/video-tasks",
            get(admin::user_video_tasks),
        )
        .route(
            "/admin/users/{user_id}/image-tasks",
            get(admin::user_image_tasks),
        )
        .route(
            "/admin/users/{user_id}/reset-password",
            put(admin::reset_password),
        )
        .route("/admin/stats", get(admin::stats))
        .route("/feedback/admin/all", get(feedback::list_all))
        .route("/feedback/admin/{id}/reply", put(feedback::reply))
        .route("/feedback/admin/{id}/status", put(feedback::set_status))
        .route("/feedback/admin/stats", get(feedback::stats))
        .route_layer(middleware::from_fn(auth::require_admin));

    Router::new()
        .route("/auth/profile", get(auth::profile))
        .route("/auth/password", put(auth::change_password))
        .route("/auth/verify", get(auth::verify))
        .route("/user-config", get(provider_config::get_user_config))
        .route("/user-config", put(provider_config::update_user_config))
        .route("/user-config/full", get(provider_config::get_user_config_full))
        .route(
            "/user-config/sync-default",
            put(provider_config::sync_defaults),
        )
        .route(
            "/user-config/{service}",
            put(provider_config::update_user_provider),
        )
        .route("/config", get(provider_config::get_global_config))
        .route("/video/create", post(video::create_sora))
        .route("/video/query", get(video::query_sora))
        .route("/video/character", post(video::create_character))
        .route("/veo/create", post(video::create_veo))
        .route("/veo/query", get(video::query_veo))
        .route("/grok/create", post(video::create_grok))
        .route("/grok/query", get(video::query_grok))
        .route("/image/create", post(image::create))
        .route("/image/create-with-ref", post(image::create_with_ref))
        .route("/image/generate", post(image::generate))
        .route("/image/generate-with-ref", post(image::generate_with_ref))
        .route("/image/query", get(image::query))
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/{external_id}", delete(tasks::delete_task))
        .route("/tasks/completed/clear", delete(tasks::clear_completed))
        .route("/feedback", post(feedback::submit))
        .route("/feedback/my", get(feedback::mine))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
