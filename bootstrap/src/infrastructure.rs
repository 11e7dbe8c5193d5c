//! 基础设施资源管理

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use adapter_vault::{VaultBackend, VaultConfig};
use common::{RetryConfig, with_conditional_retry};
use config::{AppConfig, TelemetryConfig, VaultSettings};
use errors::{VaultError, VaultResult};
use metrics_exporter_prometheus::PrometheusHandle;
use ports::SecretBackend;
use telemetry::TelemetryError;
use tracing::info;
use vault_core::{CredentialStore, ManagerConfig, VaultManager};

/// Install logging and, when enabled, the Prometheus recorder
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<PrometheusHandle>, TelemetryError> {
    if config.json_logs {
        telemetry::init_tracing_json(&config.log_level)?;
    } else {
        telemetry::init_tracing(&config.log_level)?;
    }

    if config.metrics_enabled {
        return Ok(Some(telemetry::init_metrics()?));
    }
    Ok(None)
}

/// Dump the Prometheus exposition text
///
/// The CLI is short-lived and serves no scrape endpoint, so it writes the
/// snapshot once on exit.
pub fn write_metrics(handle: &PrometheusHandle, out: &mut impl Write) -> std::io::Result<()> {
    out.write_all(handle.render().as_bytes())?;
    out.flush()
}

/// Adapter settings derived from the application config
pub fn vault_config(settings: &VaultSettings) -> VaultConfig {
    VaultConfig {
        endpoint: settings.endpoint.clone(),
        token: settings.token.clone(),
        mount_path: settings.mount_path.clone(),
        request_timeout_secs: settings.request_timeout_secs,
    }
}

/// Manager settings derived from the application config
///
/// A zero request timeout leaves backend calls unbounded.
pub fn manager_config(settings: &VaultSettings) -> ManagerConfig {
    let config = ManagerConfig::new(settings.namespace.clone())
        .with_cache_ttl(Duration::from_secs(settings.cache_ttl_secs));
    match settings.request_timeout_secs {
        0 => config,
        secs => config.with_request_timeout(Duration::from_secs(secs)),
    }
}

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    manager: Arc<VaultManager>,
    credentials: CredentialStore,
}

impl Infrastructure {
    /// Wire the Vault adapter from config
    pub fn from_config(config: AppConfig) -> VaultResult<Self> {
        let backend = VaultBackend::new(vault_config(&config.vault))?;
        info!(
            endpoint = %config.vault.endpoint,
            mount = %backend.mount_path(),
            "Vault backend created"
        );
        Self::with_backend(config, Arc::new(backend))
    }

    /// Wire an arbitrary backend
    pub fn with_backend(config: AppConfig, backend: Arc<dyn SecretBackend>) -> VaultResult<Self> {
        let manager = Arc::new(VaultManager::new(backend, manager_config(&config.vault))?);
        let credentials = CredentialStore::new(manager.clone());
        Ok(Self {
            config,
            manager,
            credentials,
        })
    }

    /// Poll the backend until it answers healthy
    ///
    /// Unavailability is retried per `retry`; denied or rejected checks fail
    /// immediately.
    pub async fn wait_until_ready(&self, retry: &RetryConfig) -> VaultResult<()> {
        let manager = self.manager.as_ref();
        with_conditional_retry(
            retry,
            "Vault health check",
            move || async move {
                if manager.health_check().await? {
                    Ok(())
                } else {
                    Err(VaultError::unavailable("Vault reported unhealthy"))
                }
            },
            VaultError::is_retryable,
        )
        .await?;

        info!(namespace = %self.manager.namespace(), "Vault backend ready");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> Arc<VaultManager> {
        self.manager.clone()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter_memory::InMemoryBackend;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use secrecy::Secret;
    use vault_core::SnowflakeCredentials;

    fn settings() -> VaultSettings {
        VaultSettings {
            endpoint: "http://127.0.0.1:8200".to_string(),
            token: Secret::new("s.root".to_string()),
            namespace: "snowflake/creds".to_string(),
            mount_path: "secret".to_string(),
            cache_ttl_secs: 45,
            request_timeout_secs: 0,
        }
    }

    fn app_config() -> AppConfig {
        AppConfig {
            app_env: "test".to_string(),
            vault: settings(),
            telemetry: TelemetryConfig::default(),
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_write_metrics_renders_recorded_counters() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            vault_core::metrics::record_cache_lookup(true);
            vault_core::metrics::record_backend_call("put", 2.5, Some("BACKEND_DENIED"));
        });

        let mut out = Vec::new();
        write_metrics(&handle, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(vault_core::metrics::CACHE_LOOKUPS_TOTAL));
        assert!(text.contains(vault_core::metrics::BACKEND_ERRORS_TOTAL));
        assert!(text.contains("BACKEND_DENIED"));
    }

    #[test]
    fn test_vault_config_from_settings() {
        use secrecy::ExposeSecret;

        let mut custom = settings();
        custom.mount_path = "kv".to_string();
        custom.request_timeout_secs = 7;

        let config = vault_config(&custom);
        assert_eq!(config.endpoint, "http://127.0.0.1:8200");
        assert_eq!(config.token.expose_secret(), "s.root");
        assert_eq!(config.mount_path, "kv");
        assert_eq!(config.request_timeout_secs, 7);
    }

    #[test]
    fn test_manager_config_from_settings() {
        let config = manager_config(&settings());
        assert_eq!(config.namespace, "snowflake/creds");
        assert_eq!(config.cache_ttl, Duration::from_secs(45));
        assert_eq!(config.request_timeout, None);

        let mut bounded = settings();
        bounded.request_timeout_secs = 10;
        assert_eq!(
            manager_config(&bounded).request_timeout,
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_from_config_builds_vault_backend() {
        let infra = Infrastructure::from_config(app_config()).unwrap();
        assert_eq!(infra.manager().namespace().as_str(), "snowflake/creds");
        assert_eq!(infra.manager().cache().ttl(), Duration::from_secs(45));
    }

    #[test]
    fn test_from_config_rejects_bad_endpoint() {
        let mut config = app_config();
        config.vault.endpoint = "not a url".to_string();
        assert!(matches!(
            Infrastructure::from_config(config),
            Err(VaultError::BackendRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_credentials_flow_through_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let infra = Infrastructure::with_backend(app_config(), backend.clone()).unwrap();

        infra.wait_until_ready(&fast_retry()).await.unwrap();

        let creds = SnowflakeCredentials::new("sf_user", "sf_pass", "sf_account");
        infra
            .credentials()
            .store_snowflake_creds("prod-db", &creds)
            .await
            .unwrap();
        assert_eq!(backend.put_calls(), 1);

        let retrieved = infra
            .credentials()
            .retrieve_snowflake_creds("prod-db")
            .await
            .unwrap();
        assert_eq!(retrieved.username, "sf_user");
    }

    #[tokio::test]
    async fn test_wait_until_ready_gives_up_on_unavailable() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_with(VaultError::unavailable("sealed"));
        let infra = Infrastructure::with_backend(app_config(), backend).unwrap();

        let err = infra.wait_until_ready(&fast_retry()).await.unwrap_err();
        assert!(matches!(err, VaultError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_wait_until_ready_stops_on_denied() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_with(VaultError::denied("permission denied"));
        let infra = Infrastructure::with_backend(app_config(), backend).unwrap();

        let err = infra.wait_until_ready(&fast_retry()).await.unwrap_err();
        assert!(matches!(err, VaultError::BackendDenied(_)));
    }
}
