//! Provider configuration: global defaults plus per-user overrides.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{Provider, ProviderPatch, ProviderSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ConfigError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ConfigError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Restricts a sync-defaults call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOptions {
    /// Provider names to touch; `None` means all of them.
    #[serde(alias = "services")]
    pub providers: Option<Vec<String>>,
    pub sync_server: bool,
    pub sync_key: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            providers: None,
            sync_server: true,
            sync_key: true,
        }
    }
}

impl SyncOptions {
    /// Providers selected by name. Unknown names are dropped.
    #[must_use]
    pub fn selected(&self) -> Vec<Provider> {
        self.providers.as_ref().map_or_else(
            || Provider::ALL.to_vec(),
            |names| names.iter().filter_map(|n| Provider::parse(n)).collect(),
        )
    }
}

/// Parses a `{provider: patch}` object, rejecting unknown provider names.
pub fn parse_patches(body: &Value) -> Result<HashMap<Provider, ProviderPatch>, ConfigError> {
    let Some(obj) = body.as_object() else {
        return Err(ConfigError::Validation(
            "Expected an object keyed by provider".to_string(),
        ));
    };

    let mut patches = HashMap::new();
    for (name, value) in obj {
        let provider =
            Provider::parse(name).ok_or_else(|| ConfigError::UnknownProvider(name.clone()))?;
        let patch: ProviderPatch = serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::Validation(format!("{name}: {e}")))?;
        patches.insert(provider, patch.for_provider(provider));
    }
    Ok(patches)
}

#[async_trait::async_trait]
pub trait ConfigService: Send + Sync {
    /// User override merged field by field over the global default.
    async fn effective_config(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<ProviderSettings, ConfigError>;

    /// Per-user overrides with keys masked.
    async fn user_display(&self, user_id: &str) -> Result<Value, ConfigError>;

    /// Per-user overrides with keys in clear text.
    async fn user_full(&self, user_id: &str) -> Result<Value, ConfigError>;

    async fn update_user_provider(
        &self,
        user_id: &str,
        provider: Provider,
        patch: &ProviderPatch,
    ) -> Result<(), ConfigError>;

    async fn update_user_all(
        &self,
        user_id: &str,
        patches: &HashMap<Provider, ProviderPatch>,
    ) -> Result<(), ConfigError>;

    /// Copies one endpoint/key pair into the selected providers' overrides.
    /// Returns the providers that were touched.
    async fn sync_defaults(
        &self,
        user_id: &str,
        server: &str,
        key: &str,
        options: &SyncOptions,
    ) -> Result<Vec<Provider>, ConfigError>;

    /// Creates empty override rows for a user. Idempotent.
    async fn ensure_user(&self, user_id: &str) -> Result<(), ConfigError>;

    /// Runs [`ConfigService::ensure_user`] for every known user.
    async fn ensure_all_users(&self) -> Result<u64, ConfigError>;

    async fn global_display(&self) -> Result<Value, ConfigError>;

    async fn global_full(&self) -> Result<Value, ConfigError>;

    async fn update_global_provider(
        &self,
        provider: Provider,
        patch: &ProviderPatch,
    ) -> Result<(), ConfigError>;

    async fn update_global_all(
        &self,
        patches: &HashMap<Provider, ProviderPatch>,
    ) -> Result<(), ConfigError>;

    /// Inserts global rows from the config file for providers that have none.
    async fn seed_globals(
        &self,
        defaults: &HashMap<Provider, ProviderSettings>,
    ) -> Result<(), ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_options_selection() {
        let all = SyncOptions::default();
        assert_eq!(all.selected().len(), 5);

        let some: SyncOptions =
            serde_json::from_value(json!({"services": ["sora", "bogus", "veo"]})).unwrap();
        assert_eq!(some.selected(), vec![Provider::Sora, Provider::Veo]);
        assert!(some.sync_server && some.sync_key);
    }

    #[test]
    fn test_parse_patches() {
        let patches = parse_patches(&json!({
            "veo": {"key": "abc", "characterKey": "dropped"},
            "sora": {"characterServer": "https://chars"}
        }))
        .unwrap();

        assert_eq!(patches[&Provider::Veo].key.as_deref(), Some("abc"));
        assert!(patches[&Provider::Veo].character_key.is_none());
        assert_eq!(
            patches[&Provider::Sora].character_server.as_deref(),
            Some("https://chars")
        );

        assert!(matches!(
            parse_patches(&json!({"midjourney": {}})),
            Err(ConfigError::UnknownProvider(_))
        ));
    }
}
