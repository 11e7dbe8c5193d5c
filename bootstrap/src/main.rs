//! credvault - store and retrieve Snowflake credentials in Vault

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use common::{RetryConfig, SecretVersion, with_conditional_retry};
use config::AppConfig;
use credvault_bootstrap::{Infrastructure, init_telemetry, write_metrics};
use errors::VaultError;
use secrecy::ExposeSecret;
use tracing::{error, warn};
use vault_core::SnowflakeCredentials;

#[derive(Parser)]
#[command(name = "credvault")]
#[command(about = "Versioned, cached credential storage on HashiCorp Vault")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding default.toml and {APP_ENV}.toml
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a Snowflake credential bundle
    Store {
        name: String,
        #[arg(long)]
        username: String,
        /// Falls back to SNOWFLAKE_PASSWORD
        #[arg(long, env = "SNOWFLAKE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        account: String,
    },

    /// Retrieve a Snowflake credential bundle, password masked
    Retrieve {
        name: String,
        /// Print the password in clear
        #[arg(long)]
        reveal: bool,
    },

    /// Read one field, or a historical version of a secret
    Read {
        name: String,
        #[arg(long)]
        field: Option<String>,
        #[arg(long)]
        version: Option<u64>,
    },

    /// Delete a secret and all its versions
    Delete { name: String },

    /// Check that Vault is reachable
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match AppConfig::load(&cli.config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {}", e);
            return ExitCode::from(78);
        }
    };

    config.telemetry.metrics_enabled |= cli.metrics;
    let metrics = match init_telemetry(&config.telemetry) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("telemetry error: {}", e);
            return ExitCode::from(70);
        }
    };

    let code = match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.code(), error = %e, "Command failed");
            eprintln!("{}: {}", e.code(), e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    };

    if let Some(handle) = &metrics {
        if let Err(e) = write_metrics(handle, &mut std::io::stderr()) {
            warn!(error = %e, "Failed to write metrics");
        }
    }
    code
}

async fn run(command: Commands, config: AppConfig) -> Result<(), VaultError> {
    let infra = Infrastructure::from_config(config)?;
    let retry = RetryConfig::default();

    match command {
        Commands::Store {
            name,
            username,
            password,
            account,
        } => {
            let creds = SnowflakeCredentials::new(username, password, account);
            let version = with_conditional_retry(
                &retry,
                "store credentials",
                || infra.credentials().store_snowflake_creds(&name, &creds),
                VaultError::is_retryable,
            )
            .await?;
            println!("stored {} at version {}", name, version);
        }
        Commands::Retrieve { name, reveal } => {
            let creds = with_conditional_retry(
                &retry,
                "retrieve credentials",
                || infra.credentials().retrieve_snowflake_creds(&name),
                VaultError::is_retryable,
            )
            .await?;
            let password = if reveal {
                creds.password.expose_secret().clone()
            } else {
                mask(creds.password.expose_secret())
            };
            println!("username: {}", creds.username);
            println!("password: {}", password);
            println!("account:  {}", creds.account);
        }
        Commands::Read {
            name,
            field,
            version,
        } => {
            let manager = infra.manager();
            match (version, field) {
                (None, Some(field)) => {
                    println!("{}", manager.read_secret_field(&name, &field).await?);
                }
                (None, None) => {
                    for key in manager.read_secret(&name).await?.keys() {
                        println!("{}", key);
                    }
                }
                (Some(v), field) => {
                    let mut fields = manager
                        .read_secret_version(&name, SecretVersion(v))
                        .await?;
                    match field {
                        Some(field) => {
                            let value = fields.remove(&field).ok_or_else(|| {
                                VaultError::not_found(format!(
                                    "field '{}' not found in version {} of {}",
                                    field, v, name
                                ))
                            })?;
                            println!("{}", value);
                        }
                        None => {
                            for key in fields.keys() {
                                println!("{}", key);
                            }
                        }
                    }
                }
            }
        }
        Commands::Delete { name } => {
            infra.manager().delete_secret(&name).await?;
            println!("deleted {}", name);
        }
        Commands::Health => {
            infra.wait_until_ready(&retry).await?;
            println!("ok");
        }
    }
    Ok(())
}

/// Keep the first two characters, star the rest
fn mask(value: &str) -> String {
    let shown: String = value.chars().take(2).collect();
    let hidden = value.chars().count().saturating_sub(2);
    format!("{}{}", shown, "*".repeat(hidden))
}
