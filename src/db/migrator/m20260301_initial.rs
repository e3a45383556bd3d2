use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(UserProviderConfigs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(GlobalProviderConfigs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(VideoTasks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(ImageTasks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Feedbacks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let conn = manager.get_connection();

        // Lazy per-user config creation relies on this for ON CONFLICT.
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_provider_configs_owner ON user_provider_configs(user_id, provider)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_video_tasks_user_created ON video_tasks(user_id, created_at)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_image_tasks_user_created ON image_tasks(user_id, created_at)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_feedbacks_user ON feedbacks(user_id)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Feedbacks).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ImageTasks).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VideoTasks).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GlobalProviderConfigs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserProviderConfigs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
