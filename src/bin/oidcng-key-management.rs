//! oidcng key management CLI tool
//!
//! Operator commands acting directly on the shared key repositories. Running
//! servers adopt a rolled over key on their next key sequence check.
//!
//! ```bash
//! # Print a new key encryption root keyset
//! oidcng-key-management generate-secret-key-set > secret_key_set.json
//!
//! # Rotate the signing key used for new tokens
//! SECRET_KEY_SET_PATH=secret_key_set.json ASSOCIATED_DATA=oidcng \
//!   STORAGE_BACKEND=postgres DATABASE_URL=postgres://localhost/oidcng \
//!   oidcng-key-management rollover-signing-key
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use oidcng::{
    config::load_secret_key_set,
    keys::{AeadKeyset, KeyManager},
    storage::{OAuthStorage, create_storage_backend, parse_storage_backend},
};
use serde_json::json;
use std::sync::Arc;

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "oidcng-key-management",
    about = "oidcng key management CLI tool",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path of the key encryption root keyset
    #[arg(long, env = "SECRET_KEY_SET_PATH")]
    secret_key_set_path: Option<String>,

    /// Associated data bound to every sealed signing key
    #[arg(long, env = "ASSOCIATED_DATA")]
    associated_data: Option<String>,

    /// Storage backend holding the key repositories
    #[arg(long, env = "STORAGE_BACKEND", default_value = "postgres")]
    storage_backend: String,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "json-pretty")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// JSON formatted output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Create a new signing key and make it current
    RolloverSigningKey,
    /// Create a new symmetric key and make it current
    RolloverSymmetricKey,
    /// Print a freshly generated key encryption root keyset
    GenerateSecretKeySet,
    /// List signing and symmetric keys, newest first
    ListKeys,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = match &cli.command {
        Commands::GenerateSecretKeySet => {
            let keyset = AeadKeyset::generate().to_json()?;
            serde_json::from_str(&keyset)?
        }
        Commands::RolloverSigningKey => {
            let key_manager = key_manager(&cli).await?;
            let record = key_manager.rollover_signing_key().await?;
            json!({ "signing_key_id": record.key_id, "created_at": record.created_at })
        }
        Commands::RolloverSymmetricKey => {
            let key_manager = key_manager(&cli).await?;
            let record = key_manager.rollover_symmetric_key().await?;
            json!({ "symmetric_key_id": record.key_id, "created_at": record.created_at })
        }
        Commands::ListKeys => list_keys(storage(&cli).await?.as_ref()).await?,
    };

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&output)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&output)?),
    }

    Ok(())
}

async fn storage(cli: &Cli) -> Result<Arc<dyn OAuthStorage>> {
    let backend = parse_storage_backend(&cli.storage_backend, cli.database_url.as_deref())?;
    Ok(create_storage_backend(backend).await?)
}

async fn key_manager(cli: &Cli) -> Result<KeyManager> {
    let path = cli
        .secret_key_set_path
        .as_deref()
        .context("SECRET_KEY_SET_PATH is required")?;
    let associated_data = cli
        .associated_data
        .as_deref()
        .context("ASSOCIATED_DATA is required")?;
    let root = load_secret_key_set(path)?;

    let key_manager = KeyManager::new(root, associated_data, storage(cli).await?);
    key_manager.initialize().await?;
    Ok(key_manager)
}

async fn list_keys(storage: &dyn OAuthStorage) -> Result<serde_json::Value> {
    let signing_keys = storage.list_signing_keys().await?;
    let symmetric_keys = storage.list_symmetric_keys().await?;

    Ok(json!({
        "current_signing_key_id": storage.current_signing_key_id().await?,
        "current_symmetric_key_id": storage.current_symmetric_key_id().await?,
        "signing_keys": signing_keys
            .iter()
            .map(|key| json!({
                "key_id": key.key_id,
                "symmetric_key_id": key.symmetric_key_id,
                "created_at": key.created_at,
            }))
            .collect::<Vec<_>>(),
        "symmetric_keys": symmetric_keys
            .iter()
            .map(|key| json!({
                "key_id": key.key_id,
                "created_at": key.created_at,
            }))
            .collect::<Vec<_>>(),
    }))
}
