//! Salted, memory-hard password credentials.
//!
//! Stored form is `salt_hex:derived_key_hex`: 16 random salt bytes and a
//! 32-byte Argon2id output. Verification never errors; anything malformed
//! simply fails to match.

use anyhow::{Context, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tokio::task;

use crate::config::SecurityConfig;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn derive(&self, password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
        let mut key = [0u8; KEY_LEN];
        self.argon2()
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow::anyhow!("Failed to derive key: {e}"))?;
        Ok(key)
    }

    pub fn hash_blocking(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);

        let key = self.derive(password, &salt)?;
        Ok(format!("{}:{}", hex::encode(salt), hex::encode(key)))
    }

    #[must_use]
    pub fn verify_blocking(&self, password: &str, stored: &str) -> bool {
        let Some((salt_hex, key_hex)) = stored.split_once(':') else {
            return false;
        };
        if salt_hex.is_empty() || key_hex.is_empty() {
            return false;
        }

        let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(key_hex)) else {
            return false;
        };

        if expected.len() != KEY_LEN {
            return false;
        }

        let Ok(actual) = self.derive(password, &salt) else {
            return false;
        };

        actual.as_slice().ct_eq(expected.as_slice()).into()
    }

    /// Hashes on the blocking pool; Argon2 would otherwise stall the runtime.
    pub async fn hash(&self, password: &str) -> Result<String> {
        let hasher = self.clone();
        let password = password.to_string();
        task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .context("Password hashing task panicked")?
    }

    pub async fn verify(&self, password: &str, stored: &str) -> bool {
        let hasher = self.clone();
        let password = password.to_string();
        let stored = stored.to_string();
        task::spawn_blocking(move || hasher.verify_blocking(&password, &stored))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        };
        CredentialHasher::new(&config).unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let h = hasher();
        let stored = h.hash_blocking("secret1").unwrap();
        assert!(h.verify_blocking("secret1", &stored));
        assert!(!h.verify_blocking("secret2", &stored));
    }

    #[test]
    fn test_hash_is_salted() {
        let h = hasher();
        let a = h.hash_blocking("same").unwrap();
        let b = h.hash_blocking("same").unwrap();
        assert_ne!(a, b);
        assert!(h.verify_blocking("same", &a));
        assert!(h.verify_blocking("same", &b));
    }

    #[test]
    fn test_stored_format() {
        let stored = hasher().hash_blocking("pw").unwrap();
        let (salt, key) = stored.split_once(':').unwrap();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(key.len(), KEY_LEN * 2);
    }

    #[test]
    fn test_malformed_credentials_fail_closed() {
        let h = hasher();
        let stored = h.hash_blocking("pw").unwrap();
        let (salt, key) = stored.split_once(':').unwrap();

        assert!(!h.verify_blocking("pw", ""));
        assert!(!h.verify_blocking("pw", "nocolon"));
        assert!(!h.verify_blocking("pw", &format!(":{key}")));
        assert!(!h.verify_blocking("pw", &format!("{salt}:")));
        assert!(!h.verify_blocking("pw", &format!("{salt}:zz")));
        assert!(!h.verify_blocking("pw", &format!("{salt}:{}", &key[..10])));
        assert!(!h.verify_blocking("pw", "$argon2id$v=19$m=8192,t=3,p=1$abc$def"));
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let h = hasher();
        let stored = h.hash("async-pw").await.unwrap();
        assert!(h.verify("async-pw", &stored).await);
        assert!(!h.verify("other", &stored).await);
    }
}
