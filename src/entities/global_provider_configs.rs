use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "global_provider_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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
