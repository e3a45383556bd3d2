use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "image_tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub task_id: String,

    pub user_id: String,

    pub provider: String,

    pub model: String,

    #[sea_orm(column_type = "Text")]
    pub prompt: String,

    pub aspect_ratio: String,

    pub image_size: String,

    pub status: String,

    /// JSON array of `{mimeType, url}`.
    #[sea_orm(column_type = "Text")]
    pub images: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
