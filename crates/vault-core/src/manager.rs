//! Vault manager
//!
//! Orchestrates the read and write paths:
//!
//! ```text
//! write: validate -> encode -> backend put -> cache store
//! read:  validate -> cache lookup -> (miss) backend get -> decode -> cache fill
//! ```
//!
//! A write always replaces the cached entry with what it just wrote. A fill
//! after a cache miss never replaces a fresher, newer entry.
//!
//! The manager makes exactly one backend attempt per operation and never
//! touches the cache when that attempt fails, times out or is cancelled.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::{Namespace, SecretName, SecretPayload, SecretVersion};
use errors::{VaultError, VaultResult};
use ports::SecretBackend;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{DEFAULT_CACHE_TTL, VersionCache};
use crate::codec;
use crate::metrics::{record_backend_call, record_cache_lookup};

/// Construction-time settings for one manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Path prefix for every secret this manager touches
    pub namespace: String,
    pub cache_ttl: Duration,
    /// Upper bound on a single backend call, `None` waits indefinitely
    pub request_timeout: Option<Duration>,
}

impl ManagerConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: None,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Namespaced, cached access to a secret backend
pub struct VaultManager {
    backend: Arc<dyn SecretBackend>,
    namespace: Namespace,
    cache: Arc<VersionCache>,
    request_timeout: Option<Duration>,
}

impl VaultManager {
    /// Build a manager with its own cache
    pub fn new(backend: Arc<dyn SecretBackend>, config: ManagerConfig) -> VaultResult<Self> {
        let cache = Arc::new(VersionCache::new(config.cache_ttl));
        Self::with_shared_cache(backend, config, cache)
    }

    /// Build a manager on a cache shared with other managers
    ///
    /// Entries are keyed by namespace, so managers over different namespaces
    /// never see each other's secrets. `config.cache_ttl` is ignored in
    /// favour of the shared cache's TTL.
    pub fn with_shared_cache(
        backend: Arc<dyn SecretBackend>,
        config: ManagerConfig,
        cache: Arc<VersionCache>,
    ) -> VaultResult<Self> {
        let namespace = Namespace::parse(&config.namespace)
            .map_err(|e| VaultError::rejected(format!("invalid namespace: {}", e)))?;

        info!(
            namespace = %namespace,
            cache_ttl_secs = cache.ttl().as_secs(),
            "Vault manager ready"
        );

        Ok(Self {
            backend,
            namespace,
            cache,
            request_timeout: config.request_timeout,
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn cache(&self) -> &VersionCache {
        &self.cache
    }

    /// Write a secret and return the version the backend assigned
    pub async fn write_secret(
        &self,
        name: &str,
        fields: BTreeMap<String, String>,
    ) -> VaultResult<SecretVersion> {
        let name = parse_name(name)?;
        let payload = codec::encode(fields)?;
        self.write_payload(name, payload, None).await
    }

    /// [`write_secret`](Self::write_secret) that aborts when `cancel` fires
    pub async fn write_secret_with_cancel(
        &self,
        name: &str,
        fields: BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> VaultResult<SecretVersion> {
        let name = parse_name(name)?;
        let payload = codec::encode(fields)?;
        self.write_payload(name, payload, Some(cancel)).await
    }

    /// Write a typed bundle whose fields serialize to strings
    pub async fn write_typed<T: Serialize>(&self, name: &str, value: &T) -> VaultResult<SecretVersion> {
        let name = parse_name(name)?;
        let payload = codec::encode_from(value)?;
        self.write_payload(name, payload, None).await
    }

    /// Read a secret's fields, from cache when fresh
    pub async fn read_secret(&self, name: &str) -> VaultResult<BTreeMap<String, String>> {
        let name = parse_name(name)?;
        self.read_fields(&name, None).await
    }

    /// [`read_secret`](Self::read_secret) that aborts when `cancel` fires
    pub async fn read_secret_with_cancel(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> VaultResult<BTreeMap<String, String>> {
        let name = parse_name(name)?;
        self.read_fields(&name, Some(cancel)).await
    }

    /// Read a secret into a typed bundle
    pub async fn read_typed<T: DeserializeOwned>(&self, name: &str) -> VaultResult<T> {
        let name = parse_name(name)?;
        let fields = self.read_fields(&name, None).await?;
        codec::from_fields(fields)
    }

    /// Read one field of a secret
    pub async fn read_secret_field(&self, name: &str, field: &str) -> VaultResult<String> {
        let mut fields = self.read_secret(name).await?;
        fields.remove(field).ok_or_else(|| {
            VaultError::not_found(format!(
                "field '{}' not found in secret at path: {}/{}",
                field, self.namespace, name
            ))
        })
    }

    /// Read a specific version
    ///
    /// Served from cache only when the fresh entry holds exactly `version`;
    /// historical reads never populate the cache.
    pub async fn read_secret_version(
        &self,
        name: &str,
        version: SecretVersion,
    ) -> VaultResult<BTreeMap<String, String>> {
        let name = parse_name(name)?;
        let path = self.namespace.full_path(&name);
        if !version.exists() {
            return Err(VaultError::not_found(format!(
                "version {} of secret at path {} does not exist",
                version, path
            )));
        }

        if let Some(entry) = self.cache.lookup(&self.namespace, &name) {
            if entry.version == version {
                record_cache_lookup(true);
                debug!(path = %path, version = %version, "Versioned read served from cache");
                return codec::decode(&entry.payload);
            }
        }
        record_cache_lookup(false);

        let payload = self
            .dispatch("get_version", &path, None, self.backend.get_version(&path, version))
            .await?;
        codec::decode(&payload)
    }

    /// Delete a secret and drop its cache entry
    ///
    /// The entry is dropped once the backend call returns, whatever the
    /// outcome: after a failed delete the backend state is unknown.
    pub async fn delete_secret(&self, name: &str) -> VaultResult<()> {
        let name = parse_name(name)?;
        let path = self.namespace.full_path(&name);

        let result = self
            .dispatch("delete", &path, None, self.backend.delete(&path))
            .await;
        self.cache.invalidate(&self.namespace, &name);
        result?;

        info!(path = %path, "Secret deleted");
        Ok(())
    }

    /// Drop the cached entry so the next read goes to the backend
    pub fn invalidate(&self, name: &str) -> VaultResult<()> {
        let name = parse_name(name)?;
        self.cache.invalidate(&self.namespace, &name);
        debug!(namespace = %self.namespace, name = %name, "Cache entry invalidated");
        Ok(())
    }

    pub async fn health_check(&self) -> VaultResult<bool> {
        self.dispatch("health_check", self.namespace.as_str(), None, self.backend.health_check())
            .await
    }

    async fn write_payload(
        &self,
        name: SecretName,
        payload: SecretPayload,
        cancel: Option<&CancellationToken>,
    ) -> VaultResult<SecretVersion> {
        let path = self.namespace.full_path(&name);
        debug!(path = %path, fields = payload.len(), "Dispatching secret write");

        let version = self
            .dispatch("put", &path, cancel, self.backend.put(&path, &payload))
            .await?;
        self.cache.store(&self.namespace, &name, version, payload);

        info!(path = %path, version = %version, "Secret written");
        Ok(version)
    }

    async fn read_fields(
        &self,
        name: &SecretName,
        cancel: Option<&CancellationToken>,
    ) -> VaultResult<BTreeMap<String, String>> {
        if let Some(entry) = self.cache.lookup(&self.namespace, name) {
            record_cache_lookup(true);
            debug!(namespace = %self.namespace, name = %name, version = %entry.version, "Cache hit");
            return codec::decode(&entry.payload);
        }
        record_cache_lookup(false);

        let path = self.namespace.full_path(name);
        debug!(path = %path, "Cache miss, reading from backend");

        let (payload, version) = self
            .dispatch("get", &path, cancel, self.backend.get(&path))
            .await?;
        let fields = codec::decode(&payload)?;
        self.cache
            .store_if_newer(&self.namespace, name, version, payload);

        info!(path = %path, version = %version, "Secret retrieved");
        Ok(fields)
    }

    /// Run one backend call under the configured timeout and the caller's
    /// cancellation token.
    async fn dispatch<T, F>(
        &self,
        operation: &'static str,
        path: &str,
        cancel: Option<&CancellationToken>,
        call: F,
    ) -> VaultResult<T>
    where
        F: Future<Output = VaultResult<T>>,
    {
        let start = Instant::now();

        let bounded = async {
            match self.request_timeout {
                Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                    Err(VaultError::unavailable(format!(
                        "{} on {} timed out after {}ms",
                        operation,
                        path,
                        limit.as_millis()
                    )))
                }),
                None => call.await,
            }
        };

        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(VaultError::cancelled(format!(
                        "{} on {} cancelled by caller",
                        operation, path
                    ))),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        };

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => record_backend_call(operation, duration_ms, None),
            Err(e) => {
                if matches!(e, VaultError::SecretNotFound(_)) {
                    debug!(operation, path = %path, "Secret not found");
                } else {
                    warn!(operation, path = %path, error = %e, "Backend call failed");
                }
                record_backend_call(operation, duration_ms, Some(e.code()));
            }
        }
        result
    }
}

fn parse_name(name: &str) -> VaultResult<SecretName> {
    SecretName::parse(name).map_err(|e| VaultError::rejected(format!("invalid secret name: {}", e)))
}
