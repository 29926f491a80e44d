//! dbtunnel CLI - connect to a data store directly or through an SSH bastion
//!
//! Reads connection options from a file, validates them, and bootstraps a
//! client. Tunneled connections stay up until Ctrl+C.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dbtunnel_client::{validate, BackendDriver, Bootstrap, SearchDriver, Strategy, WireDriver};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// dbtunnel - environment-aware connections through SSH bastions
#[derive(Parser, Debug)]
#[command(name = "dbtunnel")]
#[command(about = "dbtunnel - Connect to private data stores directly or through an SSH bastion")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ", built ", env!("BUILD_TIME"), ")"))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate options, open the tunnel if requested, and connect
    #[command(long_about = r#"
Validate the connection options, open an SSH port forward through the
bastion when `tunnel: true`, and connect the selected backend driver.

EXAMPLES:
  # Local search cluster, no tunnel
  dbtunnel connect --config local.yaml --driver search

  # Remote document store through a bastion, key read from disk
  dbtunnel connect --config remote.yaml --driver wire \
    --private-key-file ~/.ssh/bastion.pem

String values in the options file may reference environment variables
as ${VAR}.

ENVIRONMENT VARIABLES:
  DBTUNNEL_CONFIG   Path to the options file
    "#)]
    Connect {
        /// Options file (YAML, or JSON with a .json extension)
        #[arg(long, env = "DBTUNNEL_CONFIG")]
        config: PathBuf,

        /// Backend driver to connect with
        #[arg(long, value_enum, default_value_t = DriverKind::Search)]
        driver: DriverKind,

        /// Read `bastion_private_key` from this file
        #[arg(long)]
        private_key_file: Option<PathBuf>,
    },

    /// Check an options file without connecting
    Validate {
        /// Options file (YAML, or JSON with a .json extension)
        #[arg(long, env = "DBTUNNEL_CONFIG")]
        config: PathBuf,

        /// Read `bastion_private_key` from this file
        #[arg(long)]
        private_key_file: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DriverKind {
    /// HTTP search cluster (GET / probe)
    Search,
    /// Byte-stream document store (TCP, optionally TLS)
    Wire,
}

/// Setup logging with the specified log level
fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

fn load_options(path: &Path, private_key_file: Option<&Path>) -> Result<Value> {
    let mut options = config::load(path)?;
    if let Some(key_path) = private_key_file {
        config::apply_private_key_file(&mut options, key_path)?;
    }
    Ok(options)
}

/// Bootstrap with `driver` and report; hold a tunnel open until Ctrl+C
async fn connect<D: BackendDriver>(driver: D, options: &Value) -> Result<()> {
    let bootstrap = Bootstrap::new(driver);
    let status = bootstrap
        .init(options)
        .await
        .context("Failed to bootstrap connection")?;

    println!("{}", status);

    if status.strategy == Strategy::Tunneled {
        info!(
            "Forward is listening on {}; press Ctrl+C to stop",
            status.endpoint
        );
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}

fn describe(options: &Value) -> Result<String> {
    let options = validate(options).context("Invalid connection options")?;

    let mut lines = vec![
        "Options are valid.".to_string(),
        format!("  environment: {}", options.environment),
        format!("  strategy:    {}", Strategy::select(&options)),
        format!("  endpoint:    {}", options.endpoint),
    ];
    if let Some(bastion) = &options.bastion {
        lines.push(format!(
            "  bastion:     {}@{}",
            bastion.user,
            bastion.endpoint()
        ));
        lines.push(format!(
            "  forward:     {}",
            bastion.forward_endpoint()
        ));
    }
    Ok(lines.join("\n"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Connect {
            config,
            driver,
            private_key_file,
        } => {
            let options = load_options(&config, private_key_file.as_deref())?;

            let result = match driver {
                DriverKind::Search => connect(SearchDriver::default(), &options).await,
                DriverKind::Wire => connect(WireDriver::default(), &options).await,
            };
            if let Err(ref e) = result {
                error!("{:#}", e);
            }
            result
        }
        Commands::Validate {
            config,
            private_key_file,
        } => {
            let options = load_options(&config, private_key_file.as_deref())?;
            println!("{}", describe(&options)?);
            Ok(())
        }
    }
}
