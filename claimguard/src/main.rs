//! claimguard - Claims client session lifecycle host
//!
//! Runs the session lifecycle manager the way the mobile client bootstraps
//! it: a startup check, then foreground/background transitions.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (stderr keeps --json output clean)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("claimguard=info".parse()?)
                .add_directive("claimguard_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = config::Config::load()?;
    config.apply_args(&cli.global);

    if let Commands::Version = cli.command {
        println!("claimguard {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let host = commands::Host::build(&config, &cli.global)?;

    // Execute command
    match cli.command {
        Commands::Start => commands::lifecycle::start(&host).await,
        Commands::Event { state } => commands::lifecycle::event(&host, state.into()).await,
        Commands::Watch => commands::watch::execute(&host).await,
        Commands::Logout => commands::lifecycle::logout(&host).await,
        Commands::Status { json } => commands::status::execute(&host, json).await,
        Commands::Store(cmd) => commands::store::execute(cmd, &host).await,
        Commands::Version => Ok(()),
    }
}
