//! credvault-core - versioned, namespaced secret access
//!
//! - `codec`: field map <-> `SecretPayload` validation boundary
//! - `cache`: in-process version cache with TTL staleness
//! - `manager`: read/write orchestration over a `SecretBackend`
//! - `credentials`: typed Snowflake credential bundles

pub mod cache;
pub mod codec;
pub mod credentials;
pub mod manager;
pub mod metrics;

pub use cache::{CacheEntry, DEFAULT_CACHE_TTL, VersionCache};
pub use credentials::{CredentialStore, SnowflakeCredentials};
pub use manager::{ManagerConfig, VaultManager};
