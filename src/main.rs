//! Mintwatch - New-mint detection for Solana

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use mintwatch::adapters::cli::{check_config_command, inspect_command, run_command, CliApp, Command};
use mintwatch::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (keys go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level);

    match app.command {
        Command::Run(cmd) => run_command(cmd, config).await,
        Command::Inspect(cmd) => inspect_command(cmd, config).await,
        Command::CheckConfig => check_config_command(&app.config, &config),
    }
}

/// RUST_LOG wins, then --debug, then --verbose, then the config file
fn init_logging(verbose: bool, debug: bool, configured: &str) {
    let fallback = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    fmt().with_env_filter(filter).init();
}
