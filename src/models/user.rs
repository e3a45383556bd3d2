use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Unrecognised stored roles degrade to the least privileged one.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

#[must_use]
pub fn is_user_id(s: &str) -> bool {
    s.len() == USER_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

pub const USER_ID_LEN: usize = 24;

/// Fresh 24-character lowercase hex identifier.
#[must_use]
pub fn generate_user_id() -> String {
    use rand::Rng;

    let bytes: [u8; USER_ID_LEN / 2] = rand::rng().random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_match_predicate() {
        let id = generate_user_id();
        assert_eq!(id.len(), 24);
        assert!(is_user_id(&id));
        assert_ne!(id, generate_user_id());
    }

    #[test]
    fn test_is_user_id() {
        assert!(is_user_id("65a1b2c3d4e5f60718293a4b"));
        assert!(!is_user_id("alice"));
        assert!(!is_user_id("65a1b2c3d4e5f60718293a4"));
        assert!(!is_user_id("65a1b2c3d4e5f60718293a4z"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("user"), Role::User);
        assert_eq!(Role::parse("superuser"), Role::User);
    }
}
