//! Admin CLI for opstrace.
//!
//! Manages tracing provider configs in the SQLite database named by the
//! service config. Secrets are encrypted with the master key from the
//! environment and printed masked.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine;
use clap::{Parser, Subcommand};
use opstrace::api::{TraceConfigApi, TraceConfigQuery, TraceConfigRequest, error_body};
use opstrace::credentials::{CredentialCipher, DerivedTenantKeys};
use opstrace::store::SqliteRepository;
use opstrace::{ConfigStore, OpsTraceConfig, TraceError, TraceInstanceResolver};
use rand::RngCore;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

/// Manage per-application tracing provider configs.
#[derive(Parser)]
#[command(name = "opstrace-admin", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register an application under a tenant.
    RegisterApp {
        #[arg(long)]
        app: String,
        #[arg(long)]
        tenant: String,
    },

    /// Show a config with secrets masked.
    Get {
        #[arg(long)]
        app: String,
        /// `langfuse` or `langSmith`.
        #[arg(long)]
        provider: String,
    },

    /// Create a config from a JSON credential object.
    Create {
        #[arg(long)]
        app: String,
        #[arg(long)]
        provider: String,
        #[arg(long)]
        json: String,
    },

    /// Replace an existing config.
    Update {
        #[arg(long)]
        app: String,
        #[arg(long)]
        provider: String,
        #[arg(long)]
        json: String,
    },

    /// Delete a config.
    Delete {
        #[arg(long)]
        app: String,
        #[arg(long)]
        provider: String,
    },

    /// Show which provider would receive traces for a message.
    Resolve {
        #[arg(long)]
        app: String,
        #[arg(long)]
        message: String,
    },

    /// Print a fresh base64 master secret.
    GenerateMasterKey,

    /// Write the effective config to the config path.
    WriteConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(OpsTraceConfig::default_path);
    let config = OpsTraceConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    match cli.command {
        Command::GenerateMasterKey => {
            let mut secret = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            println!("{}", base64::engine::general_purpose::STANDARD.encode(secret));
            Ok(())
        }
        Command::WriteConfig => {
            opstrace::config::write_config_atomic(&config_path, &config)?;
            println!("wrote {}", config_path.display());
            Ok(())
        }
        Command::RegisterApp { app, tenant } => {
            let repo = SqliteRepository::open(&config.storage.database_path)?;
            repo.upsert_app(&app, &tenant)?;
            tracing::info!(app_id = %app, tenant_id = %tenant, "application registered");
            Ok(())
        }
        command => run_api(&config, command),
    }
}

fn run_api(config: &OpsTraceConfig, command: Command) -> anyhow::Result<()> {
    let repo = Arc::new(SqliteRepository::open(&config.storage.database_path)?);
    let keys = DerivedTenantKeys::new(&config.master_secret()?)?;
    let store = ConfigStore::new(
        repo.clone(),
        repo.clone(),
        CredentialCipher::new(Arc::new(keys)),
    );

    if let Command::Resolve { app, message } = command {
        let resolver = TraceInstanceResolver::from_config(store, repo, config);
        let body = resolver
            .resolve_for_message(&app, &message)
            .map(|client| match client {
                Some(client) => json!({"enabled": true, "tracing_provider": client.provider()}),
                None => json!({"enabled": false}),
            });
        return print_result(body);
    }

    let api = TraceConfigApi::new(store);

    let result = match command {
        Command::Get { app, provider } => api.get(&app, &query(provider)),
        Command::Create {
            app,
            provider,
            json,
        } => api.post(&app, &request(provider, &json)?),
        Command::Update {
            app,
            provider,
            json,
        } => api.put(&app, &request(provider, &json)?),
        Command::Delete { app, provider } => api.delete(&app, &query(provider)),
        Command::RegisterApp { .. }
        | Command::GenerateMasterKey
        | Command::WriteConfig
        | Command::Resolve { .. } => {
            return Ok(());
        }
    };
    print_result(result)
}

fn query(tracing_provider: String) -> TraceConfigQuery {
    TraceConfigQuery { tracing_provider }
}

fn request(tracing_provider: String, json: &str) -> anyhow::Result<TraceConfigRequest> {
    let tracing_config: Map<String, Value> =
        serde_json::from_str(json).context("--json must be a JSON object")?;
    Ok(TraceConfigRequest {
        tracing_provider,
        tracing_config,
    })
}

fn print_result(result: Result<Value, TraceError>) -> anyhow::Result<()> {
    match result {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(e) => {
            let (status, body) = error_body(&e);
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            anyhow::bail!("request failed with status {status}")
        }
    }
}
