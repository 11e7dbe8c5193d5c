//! Secret backend trait 定义

use async_trait::async_trait;
use common::{SecretPayload, SecretVersion};
use errors::VaultResult;

/// Generic secret operations against an external secret store
///
/// `full_path` is always `namespace/name`; implementations keep no state
/// between calls beyond their connection configuration.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Write a payload and return the version the store assigned to it
    async fn put(&self, full_path: &str, payload: &SecretPayload) -> VaultResult<SecretVersion>;

    /// Read the latest version
    ///
    /// Fails with `SecretNotFound` when nothing was ever written at `full_path`.
    async fn get(&self, full_path: &str) -> VaultResult<(SecretPayload, SecretVersion)>;

    /// Read one historical version
    async fn get_version(
        &self,
        full_path: &str,
        version: SecretVersion,
    ) -> VaultResult<SecretPayload>;

    /// Delete the secret with all of its versions
    async fn delete(&self, full_path: &str) -> VaultResult<()>;

    /// Whether the store answers at all
    async fn health_check(&self) -> VaultResult<bool>;
}
