//! Vault configuration

use secrecy::Secret;

/// Vault backend configuration
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server endpoint
    pub endpoint: String,

    /// Token used for every request
    pub token: Secret<String>,

    /// KV v2 secrets engine mount path
    pub mount_path: String,

    /// Request timeout in seconds, 0 disables the client-side timeout
    pub request_timeout_secs: u64,
}

fn default_mount_path() -> String {
    "secret".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8200".to_string(),
            token: Secret::new(String::new()),
            mount_path: default_mount_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Builder for VaultConfig
pub struct VaultConfigBuilder {
    config: VaultConfig,
}

impl VaultConfigBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: VaultConfig {
                endpoint: endpoint.into(),
                ..Default::default()
            },
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Secret::new(token.into());
        self
    }

    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.config.mount_path = mount_path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.config.request_timeout_secs = timeout_secs;
        self
    }

    pub fn build(self) -> VaultConfig {
        self.config
    }
}
