//! One-time email verification codes.
//!
//! Codes live in an injected [`CodeStore`]; the default is a bounded
//! in-memory map. Delivery goes through [`CodeDelivery`], which by default
//! only writes a log line.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::VerificationConfig;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("A code was sent recently, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to deliver code: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone)]
pub struct CodeEntry {
    pub code: String,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

impl CodeEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn get(&self, email: &str) -> Option<CodeEntry>;
    async fn put(&self, email: &str, entry: CodeEntry);
    async fn remove(&self, email: &str);
}

/// Bounded map. Expired entries are purged on every write; when still full
/// the entry closest to expiry is evicted.
pub struct MemoryCodeStore {
    entries: Mutex<HashMap<String, CodeEntry>>,
    capacity: usize,
}

impl MemoryCodeStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CodeEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn get(&self, email: &str) -> Option<CodeEntry> {
        self.lock().get(email).cloned()
    }

    async fn put(&self, email: &str, entry: CodeEntry) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, e| !e.is_expired(now));

        if entries.len() >= self.capacity && !entries.contains_key(email) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                debug!("Verification code store full, evicting entry");
                entries.remove(&key);
            }
        }

        entries.insert(email.to_string(), entry);
    }

    async fn remove(&self, email: &str) {
        self.lock().remove(email);
    }
}

#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes the code to the log instead of sending mail.
pub struct LogDelivery;

#[async_trait]
impl CodeDelivery for LogDelivery {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
        info!(email = %mask_email(email), code = %code, "Verification code issued");
        Ok(())
    }
}

fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

fn normalize_email(email: &str) -> Result<String, VerificationError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(VerificationError::Validation(
            "A valid email address is required".to_string(),
        )),
    }
}

pub struct VerificationService {
    store: Arc<dyn CodeStore>,
    delivery: Arc<dyn CodeDelivery>,
    ttl: Duration,
    resend_interval: Duration,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn CodeStore>,
        delivery: Arc<dyn CodeDelivery>,
        config: &VerificationConfig,
    ) -> Self {
        Self {
            store,
            delivery,
            ttl: Duration::from_secs(config.code_ttl_seconds),
            resend_interval: Duration::from_secs(config.resend_interval_seconds),
        }
    }

    /// In-memory store and log delivery, sized from config.
    pub fn from_config(config: &VerificationConfig) -> Self {
        Self::new(
            Arc::new(MemoryCodeStore::new(config.max_entries)),
            Arc::new(LogDelivery),
            config,
        )
    }

    /// Issues a fresh six-digit code for `email`.
    pub async fn send(&self, email: &str) -> Result<(), VerificationError> {
        let email = normalize_email(email)?;
        let now = Instant::now();

        if let Some(previous) = self.store.get(&email).await {
            let since = now.saturating_duration_since(previous.issued_at);
            if since < self.resend_interval {
                let wait = self.resend_interval.saturating_sub(since);
                return Err(VerificationError::RateLimited {
                    retry_after_secs: wait.as_secs().max(1),
                });
            }
        }

        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        self.delivery
            .deliver(&email, &code)
            .await
            .map_err(|e| VerificationError::Delivery(e.to_string()))?;

        self.store
            .put(
                &email,
                CodeEntry {
                    code,
                    issued_at: now,
                    expires_at: now + self.ttl,
                },
            )
            .await;
        metrics::counter!("verification_codes_sent_total").increment(1);
        Ok(())
    }

    /// Checks a code. A match consumes it.
    pub async fn verify(&self, email: &str, code: &str) -> Result<bool, VerificationError> {
        let email = normalize_email(email)?;
        let Some(entry) = self.store.get(&email).await else {
            return Ok(false);
        };

        if entry.is_expired(Instant::now()) {
            self.store.remove(&email).await;
            return Ok(false);
        }

        let matches: bool = entry.code.as_bytes().ct_eq(code.trim().as_bytes()).into();
        if matches {
            self.store.remove(&email).await;
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Remembers the last code so tests can read it back.
    #[derive(Default)]
    struct Capture(Mutex<Option<String>>);

    #[async_trait]
    impl CodeDelivery for Capture {
        async fn deliver(&self, _email: &str, code: &str) -> anyhow::Result<()> {
            *self.0.lock().unwrap() = Some(code.to_string());
            Ok(())
        }
    }

    fn service(ttl_secs: u64, resend_secs: u64) -> (VerificationService, Arc<Capture>) {
        let capture = Arc::new(Capture::default());
        let config = VerificationConfig {
            code_ttl_seconds: ttl_secs,
            resend_interval_seconds: resend_secs,
            max_entries: 10,
        };
        let svc = VerificationService::new(
            Arc::new(MemoryCodeStore::new(config.max_entries)),
            capture.clone(),
            &config,
        );
        (svc, capture)
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let (svc, capture) = service(300, 60);
        svc.send("Alice@Example.com").await.unwrap();
        let code = capture.0.lock().unwrap().clone().unwrap();
        assert_eq!(code.len(), 6);

        assert!(!svc.verify("alice@example.com", "000000x").await.unwrap());
        assert!(svc.verify("alice@example.com", &code).await.unwrap());
        assert!(!svc.verify("alice@example.com", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_resend_is_rate_limited() {
        let (svc, _) = service(300, 60);
        svc.send("bob@example.com").await.unwrap();
        assert!(matches!(
            svc.send("bob@example.com").await,
            Err(VerificationError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let (svc, capture) = service(0, 0);
        svc.send("carol@example.com").await.unwrap();
        let code = capture.0.lock().unwrap().clone().unwrap();
        assert!(!svc.verify("carol@example.com", &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_email() {
        let (svc, _) = service(300, 60);
        assert!(matches!(
            svc.send("not-an-email").await,
            Err(VerificationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_is_bounded() {
        let store = MemoryCodeStore::new(2);
        let now = Instant::now();
        for (i, email) in ["a@x.io", "b@x.io", "c@x.io"].iter().enumerate() {
            store
                .put(
                    email,
                    CodeEntry {
                        code: "123456".to_string(),
                        issued_at: now,
                        expires_at: now + Duration::from_secs(60 + i as u64),
                    },
                )
                .await;
        }

        assert_eq!(store.len(), 2);
        // Closest to expiry went first.
        assert!(store.get("a@x.io").await.is_none());
        assert!(store.get("c@x.io").await.is_some());
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "a***@example.com");
        assert_eq!(mask_email("nope"), "***");
    }
}
