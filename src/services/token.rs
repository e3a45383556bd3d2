//! Bearer token issuing and verification.
//!
//! Tokens are HS256 JWTs. Older tokens carry the username as `sub` (or no
//! `sub` at all); those are resolved to the stable user id on every request.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::db::Store;
use crate::models::user::is_user_id;
use crate::models::{AuthUser, Role};
use crate::services::auth_service::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

/// Who a decoded token claims to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Current(String),
    Legacy(String),
}

impl Subject {
    /// The single place that decides between the two subject encodings.
    fn classify(claims: &Claims) -> Option<Self> {
        match claims.sub.as_deref().filter(|s| !s.is_empty()) {
            Some(sub) if is_user_id(sub) => Some(Self::Current(sub.to_string())),
            Some(sub) => Some(Self::Legacy(sub.to_string())),
            None => claims
                .username
                .as_deref()
                .filter(|u| !u.is_empty())
                .map(|u| Self::Legacy(u.to_string())),
        }
    }
}

/// Looks legacy usernames up to their stable id and stored role.
#[async_trait::async_trait]
pub trait UsernameResolver: Send + Sync {
    async fn resolve_username(&self, username: &str) -> anyhow::Result<Option<(String, Role)>>;
}

#[async_trait::async_trait]
impl UsernameResolver for Store {
    async fn resolve_username(&self, username: &str) -> anyhow::Result<Option<(String, Role)>> {
        Ok(self
            .get_user_by_username(username)
            .await?
            .map(|u| (u.id, u.role)))
    }
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: &str, username: &str, role: Role) -> Result<String, AuthError> {
        self.issue_at(user_id, username, role, chrono::Utc::now().timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        issued_at: i64,
    ) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: Some(user_id.to_string()),
            username: Some(username.to_string()),
            role: Some(role.as_str().to_string()),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl),
        };
        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Checks signature and expiry and classifies the subject. No lookups.
    pub fn decode(&self, token: &str) -> Result<(Subject, Claims), AuthError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                debug!(error = %e, "Token rejected");
                AuthError::InvalidOrExpired
            })?;

        let subject = Subject::classify(&data.claims).ok_or(AuthError::InvalidOrExpired)?;
        Ok((subject, data.claims))
    }

    /// Full verification, resolving legacy subjects through `resolver`.
    pub async fn verify<R>(&self, token: &str, resolver: &R) -> Result<AuthUser, AuthError>
    where
        R: UsernameResolver + ?Sized,
    {
        let (subject, claims) = self.decode(token)?;

        match subject {
            Subject::Current(user_id) => Ok(AuthUser {
                user_id,
                username: claims.username.unwrap_or_default(),
                role: claims.role.as_deref().map(Role::parse).unwrap_or_default(),
            }),
            Subject::Legacy(username) => {
                let resolved = resolver
                    .resolve_username(&username)
                    .await
                    .map_err(|e| AuthError::Database(e.to_string()))?;

                let Some((user_id, role)) = resolved else {
                    warn!(username = %username, "Legacy token subject does not match any user");
                    return Err(AuthError::Unresolvable);
                };

                debug!(username = %username, user_id = %user_id, "Resolved legacy token subject");
                Ok(AuthUser {
                    user_id,
                    username,
                    role,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ID: &str = "65a1b2c3d4e5f60718293a4b";

    struct MapResolver(HashMap<String, (String, Role)>);

    #[async_trait::async_trait]
    impl UsernameResolver for MapResolver {
        async fn resolve_username(
            &self,
            username: &str,
        ) -> anyhow::Result<Option<(String, Role)>> {
            Ok(self.0.get(username).cloned())
        }
    }

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::from_secs(7 * 24 * 3600))
    }

    fn resolver() -> MapResolver {
        let mut users = HashMap::new();
        users.insert("bob".to_string(), (ID.to_string(), Role::Admin));
        MapResolver(users)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let svc = service();
        let token = svc.issue(ID, "alice", Role::User).unwrap();
        let user = svc.verify(&token, &resolver()).await.unwrap();
        assert_eq!(user.user_id, ID);
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let svc = service();
        let eight_days_ago = chrono::Utc::now().timestamp() - 8 * 24 * 3600;
        let token = svc.issue_at(ID, "alice", Role::User, eight_days_ago).unwrap();
        let err = svc.verify(&token, &resolver()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let token = TokenService::new("other", Duration::from_secs(60))
            .issue(ID, "alice", Role::User)
            .unwrap();
        let err = service().verify(&token, &resolver()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
    }

    #[tokio::test]
    async fn test_garbage_rejected() {
        let err = service().verify("not.a.jwt", &resolver()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
    }

    #[tokio::test]
    async fn test_legacy_username_subject_resolves() {
        let svc = service();
        let now = chrono::Utc::now().timestamp();
        let token = svc
            .sign(&Claims {
                sub: Some("bob".to_string()),
                username: None,
                role: Some("user".to_string()),
                iat: now,
                exp: now + 3600,
            })
            .unwrap();

        let user = svc.verify(&token, &resolver()).await.unwrap();
        assert_eq!(user.user_id, ID);
        assert_eq!(user.username, "bob");
        // Stored role wins over the stale claim.
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_legacy_missing_subject_uses_username_claim() {
        let svc = service();
        let now = chrono::Utc::now().timestamp();
        let token = svc
            .sign(&Claims {
                sub: None,
                username: Some("bob".to_string()),
                role: None,
                iat: now,
                exp: now + 3600,
            })
            .unwrap();

        assert_eq!(svc.verify(&token, &resolver()).await.unwrap().user_id, ID);
    }

    #[tokio::test]
    async fn test_legacy_unknown_user_is_unresolvable() {
        let svc = service();
        let now = chrono::Utc::now().timestamp();
        let token = svc
            .sign(&Claims {
                sub: Some("ghost".to_string()),
                username: None,
                role: None,
                iat: now,
                exp: now + 3600,
            })
            .unwrap();

        let err = svc.verify(&token, &resolver()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unresolvable));
    }

    #[test]
    fn test_classify() {
        let claims = |sub: Option<&str>, username: Option<&str>| Claims {
            sub: sub.map(String::from),
            username: username.map(String::from),
            role: None,
            iat: 0,
            exp: 0,
        };

        assert_eq!(
            Subject::classify(&claims(Some(ID), None)),
            Some(Subject::Current(ID.to_string()))
        );
        assert_eq!(
            Subject::classify(&claims(Some("alice"), None)),
            Some(Subject::Legacy("alice".to_string()))
        );
        assert_eq!(
            Subject::classify(&claims(None, Some("alice"))),
            Some(Subject::Legacy("alice".to_string()))
        );
        assert_eq!(Subject::classify(&claims(None, None)), None);
    }
}
