use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

use crate::db::{Page, timestamp};
use crate::entities::{prelude::*, users};
use crate::models::Role;

/// User data returned from repository (without the stored credential)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: Role::parse(&model.role),
            created_at: model.created_at,
            last_login: model.last_login,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Substring match on the username.
    pub keyword: Option<String>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts a user. Returns `None` when the username is already taken.
    pub async fn create(
        &self,
        id: &str,
        username: &str,
        credential: &str,
        role: Role,
    ) -> Result<Option<User>> {
        let active = users::ActiveModel {
            id: Set(id.to_string()),
            username: Set(username.to_string()),
            password: Set(credential.to_string()),
            role: Set(role.as_str().to_string()),
            created_at: Set(timestamp()),
            last_login: Set(None),
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(Some(User::from(model))),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(None)
            }
            Err(err) => Err(err).context("Failed to insert user"),
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Returns the user together with the stored credential string.
    pub async fn get_credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for credential check")?;

        Ok(user.map(|u| {
            let credential = u.password.clone();
            (User::from(u), credential)
        }))
    }

    pub async fn get_credential_by_id(&self, id: &str) -> Result<Option<String>> {
        let user = Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user for credential check")?;

        Ok(user.map(|u| u.password))
    }

    pub async fn update_credential(&self, id: &str, credential: &str) -> Result<bool> {
        let result = Users::update_many()
            .col_expr(
                users::Column::Password,
                sea_orm::sea_query::Expr::value(credential.to_string()),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update user credential")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn touch_last_login(&self, id: &str) -> Result<()> {
        Users::update_many()
            .col_expr(
                users::Column::LastLogin,
                sea_orm::sea_query::Expr::value(Some(timestamp())),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update last login")?;

        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        Users::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    pub async fn count_by_role(&self, role: Role) -> Result<u64> {
        Users::find()
            .filter(users::Column::Role.eq(role.as_str()))
            .count(&self.conn)
            .await
            .context("Failed to count users by role")
    }

    pub async fn list_ids(&self) -> Result<Vec<String>> {
        Users::find()
            .select_only()
            .column(users::Column::Id)
            .into_tuple::<String>()
            .all(&self.conn)
            .await
            .context("Failed to list user ids")
    }

    pub async fn list(&self, filter: &UserFilter, page: Page) -> Result<(Vec<User>, u64)> {
        let mut condition = Condition::all();

        if let Some(role) = filter.role {
            condition = condition.add(users::Column::Role.eq(role.as_str()));
        }

        if let Some(keyword) = filter.keyword.as_deref().filter(|k| !k.is_empty()) {
            condition = condition.add(users::Column::Username.contains(keyword));
        }

        let query = Users::find()
            .filter(condition)
            .order_by_desc(users::Column::CreatedAt);

        let total = query
            .clone()
            .count(&self.conn)
            .await
            .context("Failed to count users")?;

        let rows = query
            .offset(page.offset())
            .limit(page.limit)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok((rows.into_iter().map(User::from).collect(), total))
    }
}
