//! adapter-vault - HashiCorp Vault adapter
//!
//! Implements the `SecretBackend` port on top of Vault:
//! - Token authentication
//! - KV v2 secrets engine with version tracking
//! - Health checking
//! - Status code mapping to `VaultError`

pub mod client;
pub mod config;
pub mod error;
pub mod health;

pub use client::VaultBackend;
pub use config::{VaultConfig, VaultConfigBuilder};
pub use health::{check_backend_health, BackendHealthStatus};
