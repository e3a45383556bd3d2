use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "video_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Identifier issued by the provider.
    #[sea_orm(unique)]
    pub external_task_id: String,

    pub user_id: String,

    pub platform: String,

    pub model: String,

    #[sea_orm(column_type = "Text")]
    pub prompt: String,

    /// JSON snapshot of the creation parameters.
    #[sea_orm(column_type = "Text")]
    pub params: String,

    pub status: String,

    pub progress: i32,

    pub video_url: Option<String>,

    pub thumbnail_url: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_query_response: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
