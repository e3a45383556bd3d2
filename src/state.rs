use std::sync::Arc;
use std::time::Duration;

use crate::clients::gemini::GeminiClient;
use crate::clients::grok_image::GrokImageClient;
use crate::clients::sora::SoraClient;
use crate::clients::videos::VideoJobsClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AdminService, AssetStore, AuthService, BackgroundTasks, ConfigService, CredentialHasher,
    FeedbackService, ImageService, SeaOrmAuthService, SeaOrmConfigService, SeaOrmTaskLedger,
    TaskLedger, TokenService, VerificationService, VideoGateway,
};

/// Build a shared HTTP client for provider calls.
/// Per-call timeouts are set by each client; this one only bounds idle pooling.
fn build_shared_http_client(user_agent: &str) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub provider_config: Arc<dyn ConfigService>,

    pub ledger: Arc<dyn TaskLedger>,

    pub gateway: Arc<VideoGateway>,

    pub images: Arc<ImageService>,

    pub verification: Arc<VerificationService>,

    pub feedback: Arc<FeedbackService>,

    pub admin: Arc<AdminService>,

    pub background: BackgroundTasks,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let http = build_shared_http_client(&config.gateway.user_agent)?;
        let timeouts = &config.gateway;
        let secs = Duration::from_secs;

        let hasher = CredentialHasher::new(&config.security)?;
        let tokens = TokenService::new(
            &config.security.jwt_secret,
            secs(config.security.token_ttl_hours * 3600),
        );

        let auth: Arc<dyn AuthService> =
            Arc::new(SeaOrmAuthService::new(store.clone(), hasher, tokens));
        let provider_config: Arc<dyn ConfigService> =
            Arc::new(SeaOrmConfigService::new(store.clone()));
        let ledger: Arc<dyn TaskLedger> = Arc::new(SeaOrmTaskLedger::new(store.clone()));

        let background = BackgroundTasks::new();

        let gateway = Arc::new(VideoGateway::new(
            provider_config.clone(),
            ledger.clone(),
            SoraClient::new(http.clone(), secs(timeouts.json_timeout_seconds)),
            VideoJobsClient::new(
                http.clone(),
                secs(timeouts.upload_timeout_seconds),
                secs(timeouts.query_timeout_seconds),
            ),
        ));

        let images = Arc::new(ImageService::new(
            provider_config.clone(),
            store.clone(),
            GeminiClient::new(http.clone(), secs(timeouts.image_timeout_seconds)),
            GrokImageClient::new(http, secs(timeouts.image_timeout_seconds)),
            AssetStore::new(&config.server.uploads_path),
            background.clone(),
        ));

        let verification = Arc::new(VerificationService::from_config(&config.verification));
        let feedback = Arc::new(FeedbackService::new(store.clone()));
        let admin = Arc::new(AdminService::new(
            store.clone(),
            auth.clone(),
            provider_config.clone(),
            ledger.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
            provider_config,
            ledger,
            gateway,
            images,
            verification,
            feedback,
            admin,
            background,
        })
    }
}
