// ============================================
// File: crates/swgp-service/src/main.rs
// ============================================
//! # swgp Entry Point
//!
//! ## Creation Reason
//! Binary wrapping the relay manager: CLI parsing, logging setup and
//! signal handling.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Relay execution until Ctrl+C
//!
//! ## Usage
//! ```bash
//! swgp genpsk                           # Generate a shared secret
//! swgp validate -c /etc/swgp/config.toml
//! swgp run -c /etc/swgp/config.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG` overrides the configured log level
//! - Use systemd for production deployments
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swgp_core::Psk;
use swgp_service::Config;

// ============================================
// CLI Definition
// ============================================

/// Obfuscating UDP relay for WireGuard
#[derive(Parser, Debug)]
#[command(name = "swgp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every configured relay until interrupted
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/swgp/config.toml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/swgp/config.toml")]
        config: PathBuf,
    },

    /// Print a new random pre-shared key (base64)
    Genpsk,
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config } => cmd_run(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Genpsk => cmd_genpsk(),
    };

    if let Err(e) = result {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Runs the relays.
async fn cmd_run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load(&config_path).await?;
    init_logging(&config.logging.level);

    info!("Starting swgp v{}", env!("CARGO_PKG_VERSION"));

    let manager = config.manager()?;
    manager
        .run(async {
            for relay in manager.instances() {
                if let Some(addr) = relay.local_addr() {
                    info!(
                        instance = %relay.id(),
                        mode = %relay.descriptor().mode,
                        listen = %addr,
                        forward_to = %relay.descriptor().forward_to,
                        "Relay ready"
                    );
                }
            }

            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("swgp shutdown complete");
    Ok(())
}

/// Validates a configuration file and prints a summary.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    for descriptor in config.role_descriptors() {
        println!("{}:", descriptor.id());
        println!("   Listen:     {}", descriptor.listen);
        println!("   Forward:    {}", descriptor.forward_to);
        println!("   Mode:       {}", descriptor.mode);
        println!("   MTU:        {}", descriptor.mtu);
        println!();
    }
    println!("Limits:");
    println!("   Max Sessions:      {}", config.limits.max_sessions);
    println!("   Session Timeout:   {}s", config.limits.session_timeout);
    println!("   Cleanup Interval:  {}s", config.limits.cleanup_interval);
    println!();

    Ok(())
}

/// Prints a fresh PSK.
#[allow(clippy::unnecessary_wraps)]
fn cmd_genpsk() -> anyhow::Result<()> {
    println!("{}", Psk::generate().to_base64());
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
