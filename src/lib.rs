pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use anyhow::Context;
use cli::{Cli, Commands};
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use models::Provider;
use state::SharedState;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command() {
        Commands::Init => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_config_path);
            if Config::create_default_if_missing(&path)? {
                println!("Config file created at {}. Edit it and run again.", path.display());
            } else {
                println!("Config file already exists at {}", path.display());
            }
            Ok(())
        }
        Commands::Serve => {
            config.validate()?;
            let prometheus_handle = init_observability(&config)?;
            serve(config, prometheus_handle).await
        }
    }
}

fn init_observability(config: &Config) -> anyhow::Result<Option<PrometheusHandle>> {
    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key, value)?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    if prometheus_handle.is_some() {
        info!("Prometheus metrics recorder initialized");
    }

    Ok(prometheus_handle)
}

async fn serve(config: Config, prometheus_handle: Option<PrometheusHandle>) -> anyhow::Result<()> {
    info!(
        "Mediagate v{} starting on port {}",
        env!("CARGO_PKG_VERSION"),
        config.server.port
    );

    let port = config.server.port;
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let shared = Arc::new(SharedState::new(config).await?);
    bootstrap(&shared).await?;

    let background = shared.background.clone();
    let app = api::router(api::create_app_state(shared, prometheus_handle));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Web server running at http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    let outstanding = background.in_flight();
    if outstanding > 0 {
        info!(outstanding, "Waiting for background tasks");
    }
    let aborted = background.shutdown(grace).await;
    if aborted > 0 {
        warn!(aborted, "Background tasks aborted at shutdown");
    }

    info!("Server stopped");
    Ok(())
}

/// First-start work: the admin account, global provider defaults, and a
/// config row for every user.
async fn bootstrap(shared: &SharedState) -> anyhow::Result<()> {
    if let Some(credentials) = shared.auth.bootstrap_admin().await? {
        let path = &shared.config.security.bootstrap_credentials_path;
        let contents = format!(
            "username: {}\npassword: {}\n",
            credentials.username, credentials.password
        );
        match tokio::fs::write(path, contents).await {
            Ok(()) => warn!(
                path = %path,
                "Initial admin credentials written; change the password and delete the file"
            ),
            Err(e) => warn!(
                error = %e,
                username = %credentials.username,
                password = %credentials.password,
                "Could not write initial admin credentials, change this password now"
            ),
        }
    }

    let defaults: HashMap<Provider, models::ProviderSettings> = Provider::ALL
        .into_iter()
        .map(|p| (p, shared.config.providers.settings(p)))
        .collect();
    shared.provider_config.seed_globals(&defaults).await?;

    let initialized = shared.provider_config.ensure_all_users().await?;
    if initialized > 0 {
        info!(users = initialized, "Initialized user provider configs");
    }
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}
