//! adapter-memory - in-process secret backend
//!
//! Keeps every version of every secret in memory. Besides serving as a
//! backend for local runs it counts calls per operation and can be told to
//! fail or stall, which is what the manager tests rely on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{SecretPayload, SecretVersion};
use errors::{VaultError, VaultResult};
use parking_lot::Mutex;
use ports::SecretBackend;
use tracing::debug;

/// Per-operation call counters
#[derive(Debug, Default)]
struct CallCounts {
    put: AtomicUsize,
    get: AtomicUsize,
    get_version: AtomicUsize,
    delete: AtomicUsize,
}

/// In-memory secret backend
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    /// path -> versions, index 0 is version 1
    secrets: Mutex<HashMap<String, Vec<SecretPayload>>>,
    calls: CallCounts,
    failure: Mutex<Option<VaultError>>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload without counting it as a call
    pub fn seed(&self, full_path: &str, payload: SecretPayload) -> SecretVersion {
        let mut secrets = self.secrets.lock();
        let versions = secrets.entry(full_path.to_string()).or_default();
        versions.push(payload);
        SecretVersion(versions.len() as u64)
    }

    /// Make every following call fail with `error`
    pub fn fail_with(&self, error: VaultError) {
        *self.failure.lock() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Delay every following call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn put_calls(&self) -> usize {
        self.calls.put.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.calls.get.load(Ordering::SeqCst) + self.calls.get_version.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.delete.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.put_calls() + self.get_calls() + self.delete_calls()
    }

    pub fn reset_counts(&self) {
        self.calls.put.store(0, Ordering::SeqCst);
        self.calls.get.store(0, Ordering::SeqCst);
        self.calls.get_version.store(0, Ordering::SeqCst);
        self.calls.delete.store(0, Ordering::SeqCst);
    }

    /// Latest version stored at `full_path`, `NONE` if absent
    pub fn current_version(&self, full_path: &str) -> SecretVersion {
        self.secrets
            .lock()
            .get(full_path)
            .map(|versions| SecretVersion(versions.len() as u64))
            .unwrap_or(SecretVersion::NONE)
    }

    async fn enter(&self, counter: &AtomicUsize, full_path: &str) -> VaultResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }

        if full_path.is_empty() || full_path.split('/').any(str::is_empty) {
            return Err(VaultError::rejected(format!("malformed path: '{}'", full_path)));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for InMemoryBackend {
    async fn put(&self, full_path: &str, payload: &SecretPayload) -> VaultResult<SecretVersion> {
        self.enter(&self.calls.put, full_path).await?;

        let version = self.seed(full_path, payload.clone());
        debug!(path = %full_path, version = %version, "Stored secret in memory");
        Ok(version)
    }

    async fn get(&self, full_path: &str) -> VaultResult<(SecretPayload, SecretVersion)> {
        self.enter(&self.calls.get, full_path).await?;

        let secrets = self.secrets.lock();
        secrets
            .get(full_path)
            .and_then(|versions| {
                versions
                    .last()
                    .map(|payload| (payload.clone(), SecretVersion(versions.len() as u64)))
            })
            .ok_or_else(|| VaultError::not_found(format!("no secret at path: {}", full_path)))
    }

    async fn get_version(
        &self,
        full_path: &str,
        version: SecretVersion,
    ) -> VaultResult<SecretPayload> {
        self.enter(&self.calls.get_version, full_path).await?;

        let secrets = self.secrets.lock();
        let index = (version.0 as usize).checked_sub(1);
        secrets
            .get(full_path)
            .zip(index)
            .and_then(|(versions, index)| versions.get(index).cloned())
            .ok_or_else(|| {
                VaultError::not_found(format!(
                    "no version {} of secret at path: {}",
                    version, full_path
                ))
            })
    }

    async fn delete(&self, full_path: &str) -> VaultResult<()> {
        self.enter(&self.calls.delete, full_path).await?;

        match self.secrets.lock().remove(full_path) {
            Some(_) => Ok(()),
            None => Err(VaultError::not_found(format!("no secret at path: {}", full_path))),
        }
    }

    async fn health_check(&self) -> VaultResult<bool> {
        match self.failure.lock().clone() {
            Some(VaultError::BackendUnavailable(_)) => Ok(false),
            Some(err) => Err(err),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn payload(value: &str) -> SecretPayload {
        let mut fields = BTreeMap::new();
        fields.insert("password".to_string(), value.to_string());
        SecretPayload::new(fields).unwrap()
    }

    #[tokio::test]
    async fn test_versions_increase_per_path() {
        let backend = InMemoryBackend::new();

        assert_eq!(backend.put("ns/a", &payload("v1")).await.unwrap(), SecretVersion(1));
        assert_eq!(backend.put("ns/a", &payload("v2")).await.unwrap(), SecretVersion(2));
        assert_eq!(backend.put("ns/b", &payload("v1")).await.unwrap(), SecretVersion(1));

        let (latest, version) = backend.get("ns/a").await.unwrap();
        assert_eq!(latest.get("password"), Some("v2"));
        assert_eq!(version, SecretVersion(2));

        let first = backend.get_version("ns/a", SecretVersion(1)).await.unwrap();
        assert_eq!(first.get("password"), Some("v1"));
        assert_eq!(backend.put_calls(), 3);
        assert_eq!(backend.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_path_is_not_found() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.get("ns/missing").await,
            Err(VaultError::SecretNotFound(_))
        ));
        assert!(matches!(
            backend.get_version("ns/missing", SecretVersion::NONE).await,
            Err(VaultError::SecretNotFound(_))
        ));
        assert!(matches!(
            backend.delete("ns/missing").await,
            Err(VaultError::SecretNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_path_is_rejected() {
        let backend = InMemoryBackend::new();
        let err = backend.put("ns//a", &payload("x")).await.unwrap_err();
        assert!(matches!(err, VaultError::BackendRejected(_)));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let backend = InMemoryBackend::new();
        backend.fail_with(VaultError::unavailable("connection refused"));

        let err = backend.put("ns/a", &payload("x")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!backend.health_check().await.unwrap());
        assert_eq!(backend.current_version("ns/a"), SecretVersion::NONE);

        backend.clear_failure();
        assert!(backend.put("ns/a", &payload("x")).await.is_ok());
        assert!(backend.health_check().await.unwrap());

        backend.fail_with(VaultError::denied("permission denied"));
        assert!(matches!(
            backend.health_check().await,
            Err(VaultError::BackendDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_resets_history() {
        let backend = InMemoryBackend::new();
        backend.seed("ns/a", payload("old"));
        backend.delete("ns/a").await.unwrap();

        assert_eq!(backend.put("ns/a", &payload("new")).await.unwrap(), SecretVersion(1));
        assert_eq!(backend.delete_calls(), 1);

        backend.reset_counts();
        assert_eq!(backend.total_calls(), 0);
    }
}
