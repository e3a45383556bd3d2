use sea_orm::entity::prelude::*;

/// Per-user override for one provider. Empty strings mean "use the global value".
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_provider_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: String,

    pub provider: String,

    pub server: String,

    pub key: String,

    pub character_server: String,

    pub character_key: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
