//! Vault client implementation

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::{SecretPayload, SecretVersion};
use errors::{VaultError, VaultResult};
use ports::SecretBackend;
use secrecy::ExposeSecret;
use tracing::{debug, info};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;

use crate::config::VaultConfig;
use crate::error::map_vault_error;

/// Secret backend over the Vault KV v2 engine
pub struct VaultBackend {
    client: VaultClient,
    mount_path: String,
}

impl VaultBackend {
    /// Create a token-authenticated client
    ///
    /// No request is sent; an unreachable server surfaces on the first call.
    pub fn new(config: VaultConfig) -> VaultResult<Self> {
        info!(endpoint = %config.endpoint, mount = %config.mount_path, "Configuring Vault backend");

        validate_endpoint(&config.endpoint)?;

        let timeout = (config.request_timeout_secs > 0)
            .then(|| Duration::from_secs(config.request_timeout_secs));

        let settings = VaultClientSettingsBuilder::default()
            .address(&config.endpoint)
            .token(config.token.expose_secret())
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::rejected(format!("Invalid Vault client settings: {}", e)))?;

        let client = VaultClient::new(settings)
            .map_err(|e| map_vault_error(e, "Failed to create Vault client"))?;

        Ok(Self {
            client,
            mount_path: config.mount_path,
        })
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    fn from_transport(
        data: HashMap<String, serde_json::Value>,
        path: &str,
    ) -> VaultResult<SecretPayload> {
        SecretPayload::from_transport(data)
            .map_err(|e| VaultError::corrupt(format!("Secret at path {} is malformed: {}", path, e)))
    }
}

/// vaultrs panics on an unparsable address, so refuse obvious garbage up front.
fn validate_endpoint(endpoint: &str) -> VaultResult<()> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| {
            VaultError::rejected(format!("Vault endpoint must be an http(s) URL: {}", endpoint))
        })?;
    if rest.is_empty() || rest.starts_with('/') || rest.chars().any(char::is_whitespace) {
        return Err(VaultError::rejected(format!(
            "Vault endpoint has no valid host: {}",
            endpoint
        )));
    }
    Ok(())
}

#[async_trait]
impl SecretBackend for VaultBackend {
    async fn put(&self, full_path: &str, payload: &SecretPayload) -> VaultResult<SecretVersion> {
        debug!(path = %full_path, fields = payload.len(), "Writing secret to Vault");

        let metadata = kv2::set(
            &self.client,
            &self.mount_path,
            full_path,
            payload.fields(),
        )
        .await
        .map_err(|e| map_vault_error(e, &format!("Failed to write secret at path: {}", full_path)))?;

        let version = SecretVersion(metadata.version);
        debug!(path = %full_path, version = %version, "Successfully wrote secret to Vault");
        Ok(version)
    }

    async fn get(&self, full_path: &str) -> VaultResult<(SecretPayload, SecretVersion)> {
        debug!(path = %full_path, "Reading secret from Vault");

        // Pin the version first so the payload and its number come from the same write.
        let metadata = kv2::read_metadata(&self.client, &self.mount_path, full_path)
            .await
            .map_err(|e| {
                map_vault_error(e, &format!("Failed to read metadata at path: {}", full_path))
            })?;

        let version = SecretVersion(metadata.current_version);
        if !version.exists() {
            return Err(VaultError::not_found(format!(
                "No version written at path: {}",
                full_path
            )));
        }

        let payload = self.get_version(full_path, version).await?;
        debug!(path = %full_path, version = %version, "Successfully read secret from Vault");
        Ok((payload, version))
    }

    async fn get_version(
        &self,
        full_path: &str,
        version: SecretVersion,
    ) -> VaultResult<SecretPayload> {
        let data: HashMap<String, serde_json::Value> =
            kv2::read_version(&self.client, &self.mount_path, full_path, version.0)
                .await
                .map_err(|e| {
                    map_vault_error(
                        e,
                        &format!("Failed to read version {} at path: {}", version, full_path),
                    )
                })?;

        Self::from_transport(data, full_path)
    }

    async fn delete(&self, full_path: &str) -> VaultResult<()> {
        debug!(path = %full_path, "Deleting secret from Vault");

        kv2::delete_metadata(&self.client, &self.mount_path, full_path)
            .await
            .map_err(|e| map_vault_error(e, &format!("Failed to delete secret at path: {}", full_path)))?;

        debug!(path = %full_path, "Successfully deleted secret from Vault");
        Ok(())
    }

    async fn health_check(&self) -> VaultResult<bool> {
        // A 404 on the health path still proves the server answers with our token.
        match kv2::read_metadata(&self.client, &self.mount_path, "credvault-health-check").await {
            Ok(_) => Ok(true),
            Err(e) => match map_vault_error(e, "Vault health check") {
                VaultError::SecretNotFound(_) => Ok(true),
                err => Err(err),
            },
        }
    }
}
