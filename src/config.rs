use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::provider::{Provider, ProviderSettings};

/// Secret used when nothing else is configured. Tokens signed with it are
/// only suitable for local development.
pub const DEV_JWT_SECRET: &str = "mediagate-dev-secret-change-me";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub gateway: GatewayConfig,

    pub providers: ProvidersConfig,

    pub verification: VerificationConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/mediagate.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// `"*"` allows any origin.
    pub cors_allowed_origins: Vec<String>,

    /// Directory that generated assets are written to and served from `/uploads`.
    pub uploads_path: String,

    /// Grace period for detached jobs when the server shuts down.
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3003,
            cors_allowed_origins: vec!["*".to_string()],
            uploads_path: "uploads".to_string(),
            shutdown_grace_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,

    /// Token validity window (default: 168 = 7 days)
    pub token_ttl_hours: u64,

    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    /// Where the generated first-run admin password is written.
    pub bootstrap_credentials_path: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_hours: 24 * 7,
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            bootstrap_credentials_path: "initial_admin_credentials.txt".to_string(),
        }
    }
}

/// Outbound HTTP timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub json_timeout_seconds: u64,

    pub upload_timeout_seconds: u64,

    pub query_timeout_seconds: u64,

    pub image_timeout_seconds: u64,

    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            json_timeout_seconds: 60,
            upload_timeout_seconds: 120,
            query_timeout_seconds: 30,
            image_timeout_seconds: 120,
            user_agent: "Mediagate/1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderDefaults {
    pub server: String,

    pub key: String,

    /// Only meaningful for Sora.
    pub character_server: String,

    /// Only meaningful for Sora.
    pub character_key: String,
}

/// Global provider defaults. Seeded into the database on first start, after
/// which the database copy is authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub sora: ProviderDefaults,

    pub veo: ProviderDefaults,

    pub gemini_image: ProviderDefaults,

    pub grok: ProviderDefaults,

    pub grok_image: ProviderDefaults,
}

impl ProvidersConfig {
    #[must_use]
    pub const fn get(&self, provider: Provider) -> &ProviderDefaults {
        match provider {
            Provider::Sora => &self.sora,
            Provider::Veo => &self.veo,
            Provider::GeminiImage => &self.gemini_image,
            Provider::Grok => &self.grok,
            Provider::GrokImage => &self.grok_image,
        }
    }

    const fn get_mut(&mut self, provider: Provider) -> &mut ProviderDefaults {
        match provider {
            Provider::Sora => &mut self.sora,
            Provider::Veo => &mut self.veo,
            Provider::GeminiImage => &mut self.gemini_image,
            Provider::Grok => &mut self.grok,
            Provider::GrokImage => &mut self.grok_image,
        }
    }

    #[must_use]
    pub fn settings(&self, provider: Provider) -> ProviderSettings {
        let defaults = self.get(provider);
        let mut settings = ProviderSettings {
            server: defaults.server.clone(),
            key: defaults.key.clone(),
            ..ProviderSettings::default()
        };
        if provider.has_character_fields() {
            settings.character_server.clone_from(&defaults.character_server);
            settings.character_key.clone_from(&defaults.character_key);
        }
        settings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub code_ttl_seconds: u64,

    pub resend_interval_seconds: u64,

    /// Upper bound on outstanding codes held in memory.
    pub max_entries: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_seconds: 5 * 60,
            resend_interval_seconds: 60,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "mediagate".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

const PROVIDER_ENV_PREFIXES: [(Provider, &str); 5] = [
    (Provider::Sora, "SORA"),
    (Provider::Veo, "VEO"),
    (Provider::GeminiImage, "GEMINI_IMAGE"),
    (Provider::Grok, "GROK"),
    (Provider::GrokImage, "GROK_IMAGE"),
];

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_with_override(None)
    }

    /// Loads the first config file found (an explicit path wins), then
    /// applies environment overrides.
    pub fn load_with_override(explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit {
            info!("Loading config from: {}", path.display());
            Self::load_from_path(path)?
        } else {
            Self::config_paths()
                .into_iter()
                .find(|p| p.exists())
                .map_or_else(
                    || {
                        info!("No config file found, using defaults");
                        Ok(Self::default())
                    },
                    |path| {
                        info!("Loading config from: {}", path.display());
                        Self::load_from_path(&path)
                    },
                )?
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Environment variables take precedence over the file. The lookup is
    /// injected so tests do not have to touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(secret) = non_empty("JWT_SECRET") {
            self.security.jwt_secret = secret;
        }

        if let Some(port) = non_empty("MEDIAGATE_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid MEDIAGATE_PORT: {port}"),
            }
        }

        if let Some(db) = non_empty("MEDIAGATE_DATABASE") {
            self.general.database_path = db;
        }

        for (provider, prefix) in PROVIDER_ENV_PREFIXES {
            let defaults = self.providers.get_mut(provider);
            if let Some(server) = non_empty(&format!("{prefix}_SERVER")) {
                defaults.server = server;
            }
            if let Some(key) = non_empty(&format!("{prefix}_KEY")) {
                defaults.key = key;
            }
            if provider.has_character_fields() {
                if let Some(server) = non_empty(&format!("{prefix}_CHARACTER_SERVER")) {
                    defaults.character_server = server;
                }
                if let Some(key) = non_empty(&format!("{prefix}_CHARACTER_KEY")) {
                    defaults.character_key = key;
                }
            }
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mediagate").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".mediagate").join("config.toml"));
        }

        paths
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing(path: &Path) -> Result<bool> {
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.jwt_secret.trim().is_empty() {
            anyhow::bail!("security.jwt_secret cannot be empty");
        }

        if self.security.token_ttl_hours == 0 {
            anyhow::bail!("security.token_ttl_hours must be > 0");
        }

        if self.verification.max_entries == 0 {
            anyhow::bail!("verification.max_entries must be > 0");
        }

        if self.security.jwt_secret == DEV_JWT_SECRET {
            warn!("Using the built-in development JWT secret; set JWT_SECRET in production");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3003);
        assert_eq!(config.security.token_ttl_hours, 168);
        assert_eq!(config.verification.code_ttl_seconds, 300);
        assert_eq!(config.verification.resend_interval_seconds, 60);
        assert_eq!(config.gateway.json_timeout_seconds, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security]"));
        assert!(toml_str.contains("[providers.sora]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [providers.veo]
            server = "https://veo.example"
            key = "veo-key"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.providers.veo.server, "https://veo.example");
        assert_eq!(config.server.port, 3003);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("JWT_SECRET", "from-env"),
            ("SORA_SERVER", "https://sora.example"),
            ("SORA_CHARACTER_KEY", "char-key"),
            ("GROK_IMAGE_KEY", "gk"),
            ("VEO_KEY", "   "),
            ("MEDIAGATE_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.security.jwt_secret, "from-env");
        assert_eq!(config.providers.sora.server, "https://sora.example");
        assert_eq!(config.providers.sora.character_key, "char-key");
        assert_eq!(config.providers.grok_image.key, "gk");
        assert_eq!(config.providers.veo.key, "");
        assert_eq!(config.server.port, 3003);
    }

    #[test]
    fn test_character_fields_only_for_sora() {
        let mut config = Config::default();
        config.providers.grok.character_server = "ignored".to_string();
        config.providers.sora.character_server = "https://chars".to_string();

        assert_eq!(config.providers.settings(Provider::Grok).character_server, "");
        assert_eq!(
            config.providers.settings(Provider::Sora).character_server,
            "https://chars"
        );
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = Config::default();
        config.security.jwt_secret = String::new();
        assert!(config.validate().is_err());
    }
}
