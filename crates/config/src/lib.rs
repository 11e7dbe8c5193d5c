//! credvault-config - 配置加载库
//!
//! Sources, later ones win:
//!
//! 1. `{config_dir}/default.toml`
//! 2. `{config_dir}/{APP_ENV}.toml`
//! 3. `CREDVAULT_` prefixed env, `__` nests (`CREDVAULT_VAULT__ENDPOINT`)
//! 4. `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_PATH`

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::Uncased,
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "CREDVAULT_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Vault 配置
#[derive(Debug, Clone, Deserialize)]
pub struct VaultSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub token: Secret<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_namespace() -> String {
    "snowflake/creds".to_string()
}

fn default_mount_path() -> String {
    "secret".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON 日志（生产环境）
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default)]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_enabled: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub vault: VaultSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_env() -> String {
    "development".to_string()
}

#[derive(Serialize)]
struct EnvName {
    app_env: String,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(config_dir))
    }

    /// The provider stack `load` extracts from
    pub fn figment(config_dir: impl AsRef<Path>) -> Figment {
        let dir = config_dir.as_ref();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

        Figment::new()
            .merge(Serialized::defaults(EnvName {
                app_env: env.clone(),
            }))
            .merge(Toml::file(dir.join("default.toml")))
            .merge(Toml::file(dir.join(format!("{}.toml", env))))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(legacy_vault_env())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let vault = &self.vault;
        if vault.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("vault.endpoint is empty".to_string()));
        }
        if vault.token.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("vault.token is empty".to_string()));
        }
        if vault.namespace.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("vault.namespace is empty".to_string()));
        }
        if vault.mount_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("vault.mount_path is empty".to_string()));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

/// The variables the Vault CLI itself understands
fn legacy_vault_env() -> Env {
    Env::raw()
        .only(&["VAULT_ADDR", "VAULT_TOKEN", "VAULT_PATH"])
        .map(|key| {
            let mapped = if key == "VAULT_ADDR" {
                "vault.endpoint"
            } else if key == "VAULT_TOKEN" {
                "vault.token"
            } else {
                "vault.namespace"
            };
            Uncased::from(mapped)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const MINIMAL: &str = r#"
        [vault]
        token = "s.root"
    "#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_figment(Figment::from(Toml::string(MINIMAL))).unwrap();

        assert_eq!(config.vault.endpoint, "http://127.0.0.1:8200");
        assert_eq!(config.vault.namespace, "snowflake/creds");
        assert_eq!(config.vault.mount_path, "secret");
        assert_eq!(config.vault.cache_ttl_secs, 60);
        assert_eq!(config.vault.request_timeout_secs, 30);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_token_fails() {
        let result = AppConfig::from_figment(Figment::from(Toml::string("[vault]")));
        assert!(matches!(result, Err(ConfigError::Load(_))));

        let empty = r#"
            [vault]
            token = ""
        "#;
        let result = AppConfig::from_figment(Figment::from(Toml::string(empty)));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_token_redaction() {
        let config = AppConfig::from_figment(Figment::from(Toml::string(MINIMAL))).unwrap();
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("Secret([REDACTED"));
        assert!(!debug_output.contains("s.root"));
        assert_eq!(config.vault.token.expose_secret(), "s.root");
    }

    #[test]
    fn test_layering() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "default.toml",
                r#"
                    [vault]
                    endpoint = "http://vault.internal:8200"
                    token = "from-file"
                    cache_ttl_secs = 120
                "#,
            )?;
            jail.create_file(
                "staging.toml",
                r#"
                    [vault]
                    namespace = "staging/creds"
                "#,
            )?;
            jail.set_env("APP_ENV", "staging");
            jail.set_env("CREDVAULT_VAULT__REQUEST_TIMEOUT_SECS", "5");
            jail.set_env("CREDVAULT_TELEMETRY__LOG_LEVEL", "debug");

            let config: AppConfig = AppConfig::figment(".").extract()?;
            assert_eq!(config.app_env, "staging");
            assert_eq!(config.vault.endpoint, "http://vault.internal:8200");
            assert_eq!(config.vault.namespace, "staging/creds");
            assert_eq!(config.vault.cache_ttl_secs, 120);
            assert_eq!(config.vault.request_timeout_secs, 5);
            assert_eq!(config.telemetry.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_vault_cli_variables_win() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("default.toml", MINIMAL)?;
            jail.set_env("VAULT_ADDR", "https://vault.example.com");
            jail.set_env("VAULT_TOKEN", "s.from-env");
            jail.set_env("VAULT_PATH", "team/creds");

            let config: AppConfig = AppConfig::figment(".").extract()?;
            assert_eq!(config.vault.endpoint, "https://vault.example.com");
            assert_eq!(config.vault.token.expose_secret(), "s.from-env");
            assert_eq!(config.vault.namespace, "team/creds");
            Ok(())
        });
    }
}
