use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "feedbacks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: String,

    pub username: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub kind: String,

    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub admin_reply: Option<String>,

    pub replied_at: Option<String>,

    pub replied_by: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
