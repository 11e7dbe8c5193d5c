//! Snowflake credential bundles

use std::sync::Arc;

use common::SecretVersion;
use errors::VaultResult;
use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::manager::VaultManager;

/// Login bundle for one Snowflake account
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeCredentials {
    pub username: String,
    pub password: SecretString,
    pub account: String,
}

impl SnowflakeCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
            account: account.into(),
        }
    }
}

// secrecy refuses to serialize secrets implicitly; this is the one place the
// password leaves its wrapper, on its way to the backend.
impl Serialize for SnowflakeCredentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SnowflakeCredentials", 3)?;
        state.serialize_field("username", &self.username)?;
        state.serialize_field("password", self.password.expose_secret())?;
        state.serialize_field("account", &self.account)?;
        state.end()
    }
}

/// Stores and retrieves Snowflake bundles through a vault manager
#[derive(Clone)]
pub struct CredentialStore {
    manager: Arc<VaultManager>,
}

impl CredentialStore {
    pub fn new(manager: Arc<VaultManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &VaultManager {
        &self.manager
    }

    pub async fn store_snowflake_creds(
        &self,
        secret_name: &str,
        creds: &SnowflakeCredentials,
    ) -> VaultResult<SecretVersion> {
        self.manager.write_typed(secret_name, creds).await
    }

    /// Fails with `CorruptSecret` when the stored secret lacks a field
    pub async fn retrieve_snowflake_creds(
        &self,
        secret_name: &str,
    ) -> VaultResult<SnowflakeCredentials> {
        self.manager.read_typed(secret_name).await
    }
}
