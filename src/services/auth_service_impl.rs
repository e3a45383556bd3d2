//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::db::Store;
use crate::models::user::generate_user_id;
use crate::models::{AuthUser, Role};
use crate::services::auth_service::{
    AuthError, AuthService, BootstrapCredentials, LoginResult, UserProfile,
};
use crate::services::credentials::CredentialHasher;
use crate::services::token::TokenService;

const BOOTSTRAP_USERNAME: &str = "admin";

pub struct SeaOrmAuthService {
    store: Store,
    hasher: CredentialHasher,
    tokens: TokenService,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, hasher: CredentialHasher, tokens: TokenService) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    fn login_result(&self, user_id: String, username: String, role: Role) -> Result<LoginResult, AuthError> {
        let token = self.tokens.issue(&user_id, &username, role)?;
        Ok(LoginResult {
            token,
            user_id,
            username,
            role,
        })
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<crate::db::User, AuthError> {
        let credential = self.hasher.hash(password).await?;
        let user = self
            .store
            .create_user(&generate_user_id(), username, &credential, role)
            .await?
            .ok_or(AuthError::UsernameTaken)?;

        // Config rows are also created lazily on first read.
        if let Err(e) = self.store.ensure_user_config(&user.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to initialize user config");
        }

        Ok(user)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let Some((user, credential)) = self.store.get_user_credential(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &credential).await {
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(e) = self.store.touch_last_login(&user.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to record last login");
        }

        metrics::counter!("auth_logins_total").increment(1);
        self.login_result(user.id, user.username, user.role)
    }

    async fn register(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let user = self.create_user(username, password, Role::User).await?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        self.login_result(user.id, user.username, user.role)
    }

    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.tokens.verify(token, &self.store).await
    }

    async fn profile(&self, user_id: &str) -> Result<UserProfile, AuthError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserProfile {
            user_id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
            last_login: user.last_login,
        })
    }

    async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let credential = self
            .store
            .get_user_credential_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.hasher.verify(old_password, &credential).await {
            return Err(AuthError::Validation("Old password is incorrect".to_string()));
        }

        self.reset_password(user_id, new_password).await?;
        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    async fn reset_password(&self, user_id: &str, new_password: &str) -> Result<(), AuthError> {
        let credential = self.hasher.hash(new_password).await?;
        if self.store.update_user_credential(user_id, &credential).await? {
            Ok(())
        } else {
            Err(AuthError::UserNotFound)
        }
    }

    async fn bootstrap_admin(&self) -> Result<Option<BootstrapCredentials>, AuthError> {
        if self.store.user_count().await? > 0 {
            return Ok(None);
        }

        let password = {
            use rand::Rng;
            let bytes: [u8; 6] = rand::rng().random();
            hex::encode(bytes)
        };

        match self.create_user(BOOTSTRAP_USERNAME, &password, Role::Admin).await {
            Ok(user) => {
                info!(user_id = %user.id, "Created initial admin account");
                Ok(Some(BootstrapCredentials {
                    username: user.username,
                    password,
                }))
            }
            // Another instance bootstrapped first.
            Err(AuthError::UsernameTaken) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use std::time::Duration;

    async fn service() -> SeaOrmAuthService {
        let path = std::env::temp_dir().join(format!("mediagate-auth-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", path.display())).await.unwrap();
        let hasher = CredentialHasher::new(&SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        })
        .unwrap();
        let tokens = TokenService::new("unit-secret", Duration::from_secs(3600));
        SeaOrmAuthService::new(store, hasher, tokens)
    }

    #[tokio::test]
    async fn test_register_login_and_profile() {
        let svc = service().await;
        let registered = svc.register("alice", "secret1").await.unwrap();
        assert_eq!(registered.role, Role::User);
        assert_eq!(registered.user_id.len(), 24);

        let login = svc.login("alice", "secret1").await.unwrap();
        assert_eq!(login.user_id, registered.user_id);

        let who = svc.authenticate(&login.token).await.unwrap();
        assert_eq!(who.user_id, registered.user_id);

        let profile = svc.profile(&who.user_id).await.unwrap();
        assert!(profile.last_login.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_and_bad_password() {
        let svc = service().await;
        svc.register("alice", "secret1").await.unwrap();

        assert!(matches!(
            svc.register("alice", "other12").await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            svc.login("alice", "wrong!!").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("nobody", "secret1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_change_password_requires_old() {
        let svc = service().await;
        let user = svc.register("alice", "secret1").await.unwrap();

        assert!(matches!(
            svc.change_password(&user.user_id, "nope", "newpass1").await,
            Err(AuthError::Validation(_))
        ));
        svc.change_password(&user.user_id, "secret1", "newpass1")
            .await
            .unwrap();
        assert!(svc.login("alice", "newpass1").await.is_ok());
        assert!(svc.login("alice", "secret1").await.is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_runs_once() {
        let svc = service().await;
        let creds = svc.bootstrap_admin().await.unwrap().unwrap();
        assert_eq!(creds.password.len(), 12);

        let login = svc.login(&creds.username, &creds.password).await.unwrap();
        assert_eq!(login.role, Role::Admin);

        assert!(svc.bootstrap_admin().await.unwrap().is_none());
    }
}
