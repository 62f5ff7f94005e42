//! promgated — the promgate daemon.
//!
//! Scrapes JSON APIs and exposition endpoints described in a
//! promgate.toml file and serves them, merged with the daemon's own
//! metrics, on a single endpoint.
//!
//! # Usage
//!
//! ```text
//! promgated serve --config /etc/promgate/promgate.toml
//! promgated check --config promgate.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use promgate_core::{Config, ServiceMode};
use promgate_server::{AppState, build_router};
use tracing::info;

#[derive(Parser)]
#[command(name = "promgated", about = "promgate metrics aggregation daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the aggregated metrics endpoint.
    Serve {
        /// Path to promgate.toml.
        #[arg(long, short)]
        config: PathBuf,

        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,

        /// Override the configured listen address.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Load and validate a config file, then print a summary.
    Check {
        /// Path to promgate.toml.
        #[arg(long, short)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,promgated=debug,promgate=debug".parse().unwrap());
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    match cli.command {
        Command::Serve {
            config,
            port,
            listen,
        } => {
            let mut config = load(&config)?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(listen) = listen {
                config.listen_address = Some(listen);
            }
            serve(config).await
        }
        Command::Check { config } => check(&load(&config)?),
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    Config::from_file(path).with_context(|| format!("loading {}", path.display()))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(program = %config.program_name, "promgate daemon starting");

    let state = AppState::from_config(&config)?;
    let router = build_router(state, &config.handler_path);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, path = %config.handler_path, "metrics endpoint listening");

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("promgate daemon stopped");
    Ok(())
}

fn check(config: &Config) -> anyhow::Result<()> {
    println!("config OK");
    println!("  program:  {}", config.program_name);
    println!("  endpoint: {}{}", config.bind_addr(), config.handler_path);
    for service in &config.services {
        match service.mode {
            ServiceMode::Api => println!(
                "  service {} (api) {}, {} metric(s)",
                service.name,
                service.base_url(),
                service.metrics.len()
            ),
            ServiceMode::Forward => println!(
                "  service {} (forward) {}",
                service.name,
                service.forward_url().unwrap_or_default()
            ),
        }
    }
    Ok(())
}
