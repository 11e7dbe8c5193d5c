//! Basic usage example for adapter-vault
//!
//! Run with:
//! ```bash
//! export VAULT_ADDR=http://127.0.0.1:8200
//! export VAULT_TOKEN=root
//! cargo run -p credvault-adapter-vault --example basic_usage
//! ```

use std::collections::BTreeMap;

use credvault_adapter_vault::{VaultBackend, VaultConfigBuilder, check_backend_health};
use common::SecretPayload;
use ports::SecretBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Vault Adapter Basic Usage Example ===\n");

    // 1. Configuration from environment variables
    let config = VaultConfigBuilder::new(
        std::env::var("VAULT_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8200".to_string()),
    )
    .with_token(std::env::var("VAULT_TOKEN")?)
    .with_mount_path("secret")
    .build();

    println!("1. Vault endpoint: {}", config.endpoint);
    println!("   Mount path: {}", config.mount_path);

    let backend = VaultBackend::new(config)?;

    // 2. Health check
    let health = check_backend_health(&backend).await;
    if !health.is_healthy() {
        println!("2. ✗ Vault is unhealthy: {:?}", health.error);
        return Ok(());
    }
    println!("2. ✓ Vault is healthy ({:?}ms)", health.response_time_ms);

    // 3. Write two versions
    let path = "demo/creds/example";
    let mut fields = BTreeMap::new();
    fields.insert("username".to_string(), "demo_user".to_string());
    fields.insert("password".to_string(), "demo_password_1".to_string());
    let v1 = backend.put(path, &SecretPayload::new(fields.clone())?).await?;

    fields.insert("password".to_string(), "demo_password_2".to_string());
    let v2 = backend.put(path, &SecretPayload::new(fields)?).await?;
    println!("3. ✓ Wrote {} at versions {} and {}", path, v1, v2);

    // 4. Read latest and the previous version
    let (latest, version) = backend.get(path).await?;
    println!("4. ✓ Latest is version {} with fields {:?}", version, latest.fields().keys());
    let previous = backend.get_version(path, v1).await?;
    println!("   Version {} has {} fields", v1, previous.len());

    // 5. Clean up
    backend.delete(path).await?;
    match backend.get(path).await {
        Ok(_) => println!("5. ✗ Secret still exists (unexpected)"),
        Err(e) => println!("5. ✓ Secret deleted ({})", e.code()),
    }

    Ok(())
}
