use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    sea_query::{Expr, OnConflict},
};
use std::collections::HashMap;

use crate::db::timestamp;
use crate::entities::{global_provider_configs, prelude::*, user_provider_configs};
use crate::models::{Provider, ProviderSettings};

fn user_row_settings(model: &user_provider_configs::Model) -> ProviderSettings {
    ProviderSettings {
        server: model.server.clone(),
        key: model.key.clone(),
        character_server: model.character_server.clone(),
        character_key: model.character_key.clone(),
    }
}

fn global_row_settings(model: &global_provider_configs::Model) -> ProviderSettings {
    ProviderSettings {
        server: model.server.clone(),
        key: model.key.clone(),
        character_server: model.character_server.clone(),
        character_key: model.character_key.clone(),
    }
}

/// `ON CONFLICT DO NOTHING` surfaces as `RecordNotInserted` when every row
/// already existed.
fn ignore_not_inserted(result: Result<u64, DbErr>) -> Result<u64, DbErr> {
    match result {
        Err(DbErr::RecordNotInserted) => Ok(0),
        other => other,
    }
}

pub struct UserConfigRepository {
    conn: DatabaseConnection,
}

impl UserConfigRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Creates the empty per-provider rows for a user. Safe to call
    /// concurrently and repeatedly; returns how many rows were new.
    pub async fn ensure(&self, user_id: &str) -> Result<u64> {
        let now = timestamp();
        let rows = Provider::ALL.map(|provider| user_provider_configs::ActiveModel {
            user_id: Set(user_id.to_string()),
            provider: Set(provider.as_str().to_string()),
            server: Set(String::new()),
            key: Set(String::new()),
            character_server: Set(String::new()),
            character_key: Set(String::new()),
            updated_at: Set(now.clone()),
            ..Default::default()
        });

        let result = UserProviderConfigs::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    user_provider_configs::Column::UserId,
                    user_provider_configs::Column::Provider,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await;

        ignore_not_inserted(result).context("Failed to initialize user provider config")
    }

    pub async fn get_all(&self, user_id: &str) -> Result<HashMap<Provider, ProviderSettings>> {
        let rows = UserProviderConfigs::find()
            .filter(user_provider_configs::Column::UserId.eq(user_id))
            .all(&self.conn)
            .await
            .context("Failed to load user provider config")?;

        Ok(rows
            .iter()
            .filter_map(|row| Provider::parse(&row.provider).map(|p| (p, user_row_settings(row))))
            .collect())
    }

    pub async fn get(&self, user_id: &str, provider: Provider) -> Result<Option<ProviderSettings>> {
        let row = UserProviderConfigs::find()
            .filter(user_provider_configs::Column::UserId.eq(user_id))
            .filter(user_provider_configs::Column::Provider.eq(provider.as_str()))
            .one(&self.conn)
            .await
            .context("Failed to load user provider config")?;

        Ok(row.as_ref().map(user_row_settings))
    }

    /// Overwrites one provider row. The row must already exist.
    pub async fn save(
        &self,
        user_id: &str,
        provider: Provider,
        settings: &ProviderSettings,
    ) -> Result<bool> {
        let result = UserProviderConfigs::update_many()
            .col_expr(
                user_provider_configs::Column::Server,
                Expr::value(settings.server.clone()),
            )
            .col_expr(
                user_provider_configs::Column::Key,
                Expr::value(settings.key.clone()),
            )
            .col_expr(
                user_provider_configs::Column::CharacterServer,
                Expr::value(settings.character_server.clone()),
            )
            .col_expr(
                user_provider_configs::Column::CharacterKey,
                Expr::value(settings.character_key.clone()),
            )
            .col_expr(
                user_provider_configs::Column::UpdatedAt,
                Expr::value(timestamp()),
            )
            .filter(user_provider_configs::Column::UserId.eq(user_id))
            .filter(user_provider_configs::Column::Provider.eq(provider.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to update user provider config")?;

        Ok(result.rows_affected > 0)
    }
}

pub struct GlobalConfigRepository {
    conn: DatabaseConnection,
}

impl GlobalConfigRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts rows for providers that have none yet. Existing rows win over
    /// the supplied defaults.
    pub async fn seed(&self, defaults: &HashMap<Provider, ProviderSettings>) -> Result<u64> {
        let now = timestamp();
        let rows: Vec<_> = Provider::ALL
            .iter()
            .map(|provider| {
                let settings = defaults.get(provider).cloned().unwrap_or_default();
                global_provider_configs::ActiveModel {
                    provider: Set(provider.as_str().to_string()),
                    server: Set(settings.server),
                    key: Set(settings.key),
                    character_server: Set(settings.character_server),
                    character_key: Set(settings.character_key),
                    updated_at: Set(now.clone()),
                }
            })
            .collect();

        let result = GlobalProviderConfigs::insert_many(rows)
            .on_conflict(
                OnConflict::column(global_provider_configs::Column::Provider)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await;

        ignore_not_inserted(result).context("Failed to seed global provider config")
    }

    pub async fn get_all(&self) -> Result<HashMap<Provider, ProviderSettings>> {
        let rows = GlobalProviderConfigs::find()
            .all(&self.conn)
            .await
            .context("Failed to load global provider config")?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Provider::parse(&row.provider).map(|p| (p, global_row_settings(row)))
            })
            .collect())
    }

    pub async fn get(&self, provider: Provider) -> Result<Option<ProviderSettings>> {
        let row = GlobalProviderConfigs::find_by_id(provider.as_str().to_string())
            .one(&self.conn)
            .await
            .context("Failed to load global provider config")?;

        Ok(row.as_ref().map(global_row_settings))
    }

    /// Upserts one provider row.
    pub async fn save(&self, provider: Provider, settings: &ProviderSettings) -> Result<()> {
        let row = global_provider_configs::ActiveModel {
            provider: Set(provider.as_str().to_string()),
            server: Set(settings.server.clone()),
            key: Set(settings.key.clone()),
            character_server: Set(settings.character_server.clone()),
            character_key: Set(settings.character_key.clone()),
            updated_at: Set(timestamp()),
        };

        GlobalProviderConfigs::insert(row)
            .on_conflict(
                OnConflict::column(global_provider_configs::Column::Provider)
                    .update_columns([
                        global_provider_configs::Column::Server,
                        global_provider_configs::Column::Key,
                        global_provider_configs::Column::CharacterServer,
                        global_provider_configs::Column::CharacterKey,
                        global_provider_configs::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to save global provider config")?;

        Ok(())
    }
}
