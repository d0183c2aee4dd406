//! restgate server binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use restgate_core::AuthClaims;
use restgate_core::config::AppConfig;
use restgate_server::{AppState, create_router};
use restgate_signer::TokenSigner;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// restgate - restic REST backend over object storage
#[derive(Parser, Debug)]
#[command(name = "restgated")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "RESTGATE_CONFIG",
        default_value = "config/restgate.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print a signed access token for the configured secret
    IssueToken {
        /// User name recorded in logs and metrics
        #[arg(long)]
        user: String,
        /// Repository the token grants access to
        #[arg(long)]
        repository: String,
        /// Forbid overwrites and non-lock deletes
        #[arg(long)]
        write_once: bool,
        /// Token lifetime in seconds; omit for a token without expiry
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args.config)?;
    config.validate().context("invalid configuration")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::IssueToken {
            user,
            repository,
            write_once,
            ttl_secs,
        } => issue_token(&config, user, repository, write_once, ttl_secs),
    }
}

/// Load configuration from the optional file and `RESTGATE_` variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("RESTGATE_") && key != "RESTGATE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: restgated --config /path/to/restgate.toml\n  \
             2. Environment variables: RESTGATE_AUTH__SECRET=<32+ byte secret> \
             RESTGATE_STORAGE__TYPE=filesystem RESTGATE_STORAGE__PATH=/srv/restic restgated\n\n\
             See config/restgate.example.toml for example configuration."
        );
    }

    figment
        .merge(Env::prefixed("RESTGATE_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn serve(config: AppConfig) -> Result<()> {
    tracing::info!("restgate v{}", env!("CARGO_PKG_VERSION"));

    restgate_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = restgate_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend connectivity verified");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, storage).context("failed to initialize token verifier")?;
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn issue_token(
    config: &AppConfig,
    user: String,
    repository: String,
    write_once: bool,
    ttl_secs: Option<u64>,
) -> Result<()> {
    repository
        .parse::<restgate_core::RepositoryName>()
        .context("invalid repository name")?;

    let signer = TokenSigner::new(config.auth.secret.as_bytes()).context("invalid auth.secret")?;
    let claims = AuthClaims::new(user, repository, write_once);
    let token = match ttl_secs {
        Some(ttl) => {
            let ttl = i64::try_from(ttl).context("ttl_secs out of range")?;
            signer.sign_with_expiry(&claims, time::Duration::seconds(ttl))
        }
        None => signer.sign(&claims),
    }
    .context("failed to sign token")?;

    println!("{token}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
