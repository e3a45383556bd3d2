//! `SeaORM` implementation of the `ConfigService` trait.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::db::Store;
use crate::models::provider::config_view;
use crate::models::{Provider, ProviderPatch, ProviderSettings};
use crate::services::config_service::{ConfigError, ConfigService, SyncOptions};

pub struct SeaOrmConfigService {
    store: Store,
}

impl SeaOrmConfigService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn user_settings(
        &self,
        user_id: &str,
    ) -> Result<HashMap<Provider, ProviderSettings>, ConfigError> {
        self.ensure_user(user_id).await?;
        Ok(self.store.get_user_config(user_id).await?)
    }
}

#[async_trait]
impl ConfigService for SeaOrmConfigService {
    async fn effective_config(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<ProviderSettings, ConfigError> {
        self.ensure_user(user_id).await?;

        let user = self
            .store
            .get_user_provider_config(user_id, provider)
            .await?
            .unwrap_or_default();
        let global = self
            .store
            .get_global_provider_config(provider)
            .await?
            .unwrap_or_default();

        Ok(user.merged_over(&global))
    }

    async fn user_display(&self, user_id: &str) -> Result<Value, ConfigError> {
        let mut settings = self.user_settings(user_id).await?;
        Ok(config_view(|p| settings.remove(&p).unwrap_or_default(), false))
    }

    async fn user_full(&self, user_id: &str) -> Result<Value, ConfigError> {
        let mut settings = self.user_settings(user_id).await?;
        Ok(config_view(|p| settings.remove(&p).unwrap_or_default(), true))
    }

    async fn update_user_provider(
        &self,
        user_id: &str,
        provider: Provider,
        patch: &ProviderPatch,
    ) -> Result<(), ConfigError> {
        self.ensure_user(user_id).await?;

        let mut current = self
            .store
            .get_user_provider_config(user_id, provider)
            .await?
            .unwrap_or_default();
        current.apply(&patch.clone().for_provider(provider));

        self.store
            .save_user_provider_config(user_id, provider, &current)
            .await?;
        debug!(user_id = %user_id, provider = %provider, "User provider config updated");
        Ok(())
    }

    async fn update_user_all(
        &self,
        user_id: &str,
        patches: &HashMap<Provider, ProviderPatch>,
    ) -> Result<(), ConfigError> {
        for (provider, patch) in patches {
            self.update_user_provider(user_id, *provider, patch).await?;
        }
        Ok(())
    }

    async fn sync_defaults(
        &self,
        user_id: &str,
        server: &str,
        key: &str,
        options: &SyncOptions,
    ) -> Result<Vec<Provider>, ConfigError> {
        let server = server.trim();
        let key = key.trim();
        let apply_server = options.sync_server && !server.is_empty();
        let apply_key = options.sync_key && !key.is_empty();

        if !apply_server && !apply_key {
            debug!(user_id = %user_id, "Nothing to sync");
            return Ok(Vec::new());
        }

        let mut current = self.user_settings(user_id).await?;
        let mut touched = Vec::new();

        for provider in options.selected() {
            let mut settings = current.remove(&provider).unwrap_or_default();

            if apply_server {
                settings.server = server.to_string();
                if provider.has_character_fields() {
                    settings.character_server = server.to_string();
                }
            }
            if apply_key {
                settings.key = key.to_string();
                if provider.has_character_fields() {
                    settings.character_key = key.to_string();
                }
            }

            self.store
                .save_user_provider_config(user_id, provider, &settings)
                .await?;
            touched.push(provider);
        }

        info!(user_id = %user_id, providers = touched.len(), "Synced defaults to providers");
        Ok(touched)
    }

    async fn ensure_user(&self, user_id: &str) -> Result<(), ConfigError> {
        let created = self.store.ensure_user_config(user_id).await?;
        if created > 0 {
            debug!(user_id = %user_id, rows = created, "Initialized user provider config");
        }
        Ok(())
    }

    async fn ensure_all_users(&self) -> Result<u64, ConfigError> {
        let mut initialized = 0;
        for user_id in self.store.list_user_ids().await? {
            if self.store.ensure_user_config(&user_id).await? > 0 {
                initialized += 1;
            }
        }
        Ok(initialized)
    }

    async fn global_display(&self) -> Result<Value, ConfigError> {
        let mut settings = self.store.get_global_config().await?;
        Ok(config_view(|p| settings.remove(&p).unwrap_or_default(), false))
    }

    async fn global_full(&self) -> Result<Value, ConfigError> {
        let mut settings = self.store.get_global_config().await?;
        Ok(config_view(|p| settings.remove(&p).unwrap_or_default(), true))
    }

    async fn update_global_provider(
        &self,
        provider: Provider,
        patch: &ProviderPatch,
    ) -> Result<(), ConfigError> {
        let mut current = self
            .store
            .get_global_provider_config(provider)
            .await?
            .unwrap_or_default();
        current.apply(&patch.clone().for_provider(provider));

        self.store
            .save_global_provider_config(provider, &current)
            .await?;
        info!(provider = %provider, "Global provider config updated");
        Ok(())
    }

    async fn update_global_all(
        &self,
        patches: &HashMap<Provider, ProviderPatch>,
    ) -> Result<(), ConfigError> {
        for (provider, patch) in patches {
            self.update_global_provider(*provider, patch).await?;
        }
        Ok(())
    }

    async fn seed_globals(
        &self,
        defaults: &HashMap<Provider, ProviderSettings>,
    ) -> Result<(), ConfigError> {
        let inserted = self.store.seed_global_config(defaults).await?;
        if inserted > 0 {
            info!(rows = inserted, "Seeded global provider config");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> SeaOrmConfigService {
        let path =
            std::env::temp_dir().join(format!("mediagate-config-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", path.display())).await.unwrap();
        SeaOrmConfigService::new(store)
    }

    fn settings(server: &str, key: &str) -> ProviderSettings {
        ProviderSettings {
            server: server.to_string(),
            key: key.to_string(),
            ..ProviderSettings::default()
        }
    }

    #[tokio::test]
    async fn test_effective_config_merges_per_field() {
        let svc = service().await;
        let mut defaults = HashMap::new();
        defaults.insert(Provider::Sora, settings("https://a", "K1"));
        svc.seed_globals(&defaults).await.unwrap();

        svc.update_user_provider(
            "u1",
            Provider::Sora,
            &ProviderPatch {
                server: Some(String::new()),
                key: Some("K2".to_string()),
                ..ProviderPatch::default()
            },
        )
        .await
        .unwrap();

        let effective = svc.effective_config("u1", Provider::Sora).await.unwrap();
        assert_eq!(effective.server, "https://a");
        assert_eq!(effective.key, "K2");
    }

    #[tokio::test]
    async fn test_unknown_user_gets_pure_defaults() {
        let svc = service().await;
        let mut defaults = HashMap::new();
        defaults.insert(Provider::Veo, settings("https://veo", "veo-key"));
        svc.seed_globals(&defaults).await.unwrap();

        let effective = svc.effective_config("fresh", Provider::Veo).await.unwrap();
        assert_eq!(effective, settings("https://veo", "veo-key"));
    }

    #[tokio::test]
    async fn test_sync_defaults_respects_options() {
        let svc = service().await;
        let options = SyncOptions {
            providers: Some(vec!["sora".to_string(), "grok".to_string()]),
            sync_server: true,
            sync_key: false,
        };

        let touched = svc
            .sync_defaults("u1", "https://proxy", "ignored-key", &options)
            .await
            .unwrap();
        assert_eq!(touched, vec![Provider::Sora, Provider::Grok]);

        let full = svc.user_full("u1").await.unwrap();
        assert_eq!(full["sora"]["server"], "https://proxy");
        assert_eq!(full["sora"]["characterServer"], "https://proxy");
        assert_eq!(full["sora"]["key"], "");
        assert_eq!(full["grok"]["server"], "https://proxy");
        assert_eq!(full["veo"]["server"], "");
    }

    #[tokio::test]
    async fn test_display_masks_but_full_does_not() {
        let svc = service().await;
        svc.sync_defaults("u1", "", "sk-1234567890abcdef", &SyncOptions::default())
            .await
            .unwrap();

        let display = svc.user_display("u1").await.unwrap();
        assert_eq!(display["veo"]["key"], "sk-123****abcdef");

        let full = svc.user_full("u1").await.unwrap();
        assert_eq!(full["veo"]["key"], "sk-1234567890abcdef");
    }

    #[tokio::test]
    async fn test_sync_with_nothing_is_a_no_op() {
        let svc = service().await;
        svc.update_user_provider(
            "u1",
            Provider::Veo,
            &ProviderPatch {
                server: Some("https://mine".to_string()),
                ..ProviderPatch::default()
            },
        )
        .await
        .unwrap();

        let touched = svc
            .sync_defaults("u1", " ", "", &SyncOptions::default())
            .await
            .unwrap();
        assert!(touched.is_empty());

        let full = svc.user_full("u1").await.unwrap();
        assert_eq!(full["veo"]["server"], "https://mine");
    }
}
