//! Version cache
//!
//! In-process map from (namespace, name) to the last observed version and
//! payload. The cache is advisory: it never fails, expired entries read as
//! absent and are only replaced by the next store.

use std::collections::HashMap;
use std::time::Duration;

use common::{Namespace, SecretName, SecretPayload, SecretVersion};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::trace;

/// Default time an entry is served before it reads as absent
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

type CacheKey = (Namespace, SecretName);

/// One cached secret
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub name: SecretName,
    pub version: SecretVersion,
    pub payload: SecretPayload,
    pub observed_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.observed_at) < ttl
    }
}

/// Whole-cache lock; every mutation is a single replace or remove.
#[derive(Debug)]
pub struct VersionCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl VersionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for the secret, if any
    pub fn lookup(&self, namespace: &Namespace, name: &SecretName) -> Option<CacheEntry> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .get(&(namespace.clone(), name.clone()))
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .cloned()
    }

    /// Insert or replace the entry, stamped with the current time
    pub fn store(
        &self,
        namespace: &Namespace,
        name: &SecretName,
        version: SecretVersion,
        payload: SecretPayload,
    ) {
        let entry = CacheEntry {
            name: name.clone(),
            version,
            payload,
            observed_at: Instant::now(),
        };
        self.entries
            .write()
            .insert((namespace.clone(), name.clone()), entry);
    }

    /// [`store`](Self::store) unless a still-fresh entry holds a newer version
    ///
    /// For read-through fills only: a slow backend read that finishes after
    /// a newer write must not put older data back. Writes always use `store`,
    /// since a backend may legitimately restart numbering after a delete.
    /// Returns whether the entry was stored.
    pub fn store_if_newer(
        &self,
        namespace: &Namespace,
        name: &SecretName,
        version: SecretVersion,
        payload: SecretPayload,
    ) -> bool {
        let now = Instant::now();
        let key = (namespace.clone(), name.clone());
        let mut entries = self.entries.write();

        if let Some(current) = entries.get(&key) {
            if current.version > version && current.is_fresh(self.ttl, now) {
                trace!(
                    namespace = %namespace,
                    name = %name,
                    cached = %current.version,
                    offered = %version,
                    "Ignoring read-through fill of an older version"
                );
                return false;
            }
        }

        entries.insert(
            key,
            CacheEntry {
                name: name.clone(),
                version,
                payload,
                observed_at: now,
            },
        );
        true
    }

    /// Drop the entry if present
    pub fn invalidate(&self, namespace: &Namespace, name: &SecretName) {
        self.entries
            .write()
            .remove(&(namespace.clone(), name.clone()));
    }

    /// Entries held, fresh or expired
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for VersionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ns() -> Namespace {
        Namespace::parse("snowflake/creds").unwrap()
    }

    fn name(s: &str) -> SecretName {
        SecretName::parse(s).unwrap()
    }

    fn payload(value: &str) -> SecretPayload {
        let mut fields = BTreeMap::new();
        fields.insert("password".to_string(), value.to_string());
        SecretPayload::new(fields).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_then_lookup() {
        let cache = VersionCache::default();
        assert!(cache.lookup(&ns(), &name("prod-db")).is_none());

        cache.store(&ns(), &name("prod-db"), SecretVersion(1), payload("sf_pass"));

        let entry = cache.lookup(&ns(), &name("prod-db")).unwrap();
        assert_eq!(entry.version, SecretVersion(1));
        assert_eq!(entry.payload.get("password"), Some("sf_pass"));
        assert_eq!(entry.name, name("prod-db"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = VersionCache::new(Duration::from_secs(10));
        cache.store(&ns(), &name("prod-db"), SecretVersion(1), payload("sf_pass"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.lookup(&ns(), &name("prod-db")).is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.lookup(&ns(), &name("prod-db")).is_none());
        // expired entries are not evicted
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_replaces_without_merging() {
        let cache = VersionCache::default();
        cache.store(&ns(), &name("prod-db"), SecretVersion(1), payload("old"));

        let mut fields = BTreeMap::new();
        fields.insert("token".to_string(), "new".to_string());
        cache.store(
            &ns(),
            &name("prod-db"),
            SecretVersion(2),
            SecretPayload::new(fields).unwrap(),
        );

        let entry = cache.lookup(&ns(), &name("prod-db")).unwrap();
        assert_eq!(entry.version, SecretVersion(2));
        assert_eq!(entry.payload.get("password"), None);
        assert_eq!(entry.payload.get("token"), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_always_replaces_even_with_lower_version() {
        let cache = VersionCache::default();
        cache.store(&ns(), &name("prod-db"), SecretVersion(3), payload("v3"));
        cache.store(&ns(), &name("prod-db"), SecretVersion(1), payload("recreated"));

        let entry = cache.lookup(&ns(), &name("prod-db")).unwrap();
        assert_eq!(entry.version, SecretVersion(1));
        assert_eq!(entry.payload.get("password"), Some("recreated"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_if_newer_keeps_fresher_entry() {
        let cache = VersionCache::new(Duration::from_secs(10));
        cache.store(&ns(), &name("prod-db"), SecretVersion(3), payload("v3"));

        assert!(!cache.store_if_newer(&ns(), &name("prod-db"), SecretVersion(2), payload("v2")));
        assert_eq!(
            cache.lookup(&ns(), &name("prod-db")).unwrap().version,
            SecretVersion(3)
        );

        assert!(cache.store_if_newer(&ns(), &name("prod-db"), SecretVersion(3), payload("v3b")));
        assert_eq!(
            cache.lookup(&ns(), &name("prod-db")).unwrap().payload.get("password"),
            Some("v3b")
        );

        // once expired, any fill wins
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.store_if_newer(&ns(), &name("prod-db"), SecretVersion(1), payload("v1")));
        assert_eq!(
            cache.lookup(&ns(), &name("prod-db")).unwrap().version,
            SecretVersion(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_is_idempotent() {
        let cache = VersionCache::default();
        cache.invalidate(&ns(), &name("missing"));

        cache.store(&ns(), &name("prod-db"), SecretVersion(1), payload("sf_pass"));
        cache.invalidate(&ns(), &name("prod-db"));
        cache.invalidate(&ns(), &name("prod-db"));
        assert!(cache.lookup(&ns(), &name("prod-db")).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_namespaces_are_isolated() {
        let cache = VersionCache::default();
        let other = Namespace::parse("postgres/creds").unwrap();
        cache.store(&ns(), &name("prod-db"), SecretVersion(1), payload("sf_pass"));

        assert!(cache.lookup(&other, &name("prod-db")).is_none());
        cache.invalidate(&other, &name("prod-db"));
        assert!(cache.lookup(&ns(), &name("prod-db")).is_some());
    }
}
