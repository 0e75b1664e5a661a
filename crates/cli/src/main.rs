//! wgmesh CLI - Main Entry Point
//!
//! Synthesizes, deploys, and wipes peer-to-peer WireGuard mesh
//! configuration from a declarative host inventory.

use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::{clean, generate, install};

/// wgmesh - WireGuard mesh configuration generator
#[derive(Parser)]
#[command(name = "wgmesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host inventory file
    #[arg(long, default_value = "wgmesh.yaml")]
    inventory: PathBuf,

    /// Directory holding generated key material
    #[arg(long, default_value = "keys")]
    keys_dir: PathBuf,

    /// Directory rendered configs are written to
    #[arg(long, default_value = "dist")]
    dist_dir: PathBuf,

    /// Generate per-host configs (and any missing key material)
    #[arg(long)]
    generate: bool,

    /// Deploy rendered configs to their hosts over SSH
    #[arg(long)]
    install: bool,

    /// Wipe all generated key material and rendered configs
    #[arg(long)]
    clean: bool,

    /// Restrict processing to these hosts (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    hosts: Option<Vec<String>>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    if !cli.generate && !cli.install && !cli.clean {
        bail!("nothing to do: pass at least one of --generate, --install, --clean");
    }

    // Flags compose; clean runs first so generate starts from a blank slate.
    if cli.clean {
        clean::execute(&cli.keys_dir, &cli.dist_dir).await?;
    }
    if cli.generate {
        generate::execute(
            &cli.inventory,
            &cli.keys_dir,
            &cli.dist_dir,
            cli.hosts.as_deref(),
        )
        .await?;
    }
    if cli.install {
        install::execute(&cli.inventory, &cli.dist_dir, cli.hosts.as_deref()).await?;
    }

    Ok(())
}
