//! Replay CLI - Version-pinned report rendering.
//!
//! Provides commands for:
//! - `serve`: Start the report server
//! - `token encrypt|decrypt|test`: Build and inspect report tokens
//! - `engine install|list`: Manage installed engine versions

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{EngineCommand, ServeArgs, TokenCommand};
use error::CliError;
use output::Output;

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Replay - Render stored reports with the engine that produced them.
#[derive(Parser)]
#[command(name = "replay", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the report server.
    Serve(ServeArgs),
    /// Report token commands.
    #[command(subcommand)]
    Token(TokenCommand),
    /// Engine version commands.
    #[command(subcommand)]
    Engine(EngineCommand),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = match &cli.command {
        Commands::Serve(args) => args.verbose,
        Commands::Engine(cmd) => cmd.verbose(),
        Commands::Token(_) => false,
    };

    // --verbose enables INFO level, otherwise use RUST_LOG
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => runtime().and_then(|rt| rt.block_on(args.execute(VERSION))),
        Commands::Token(cmd) => cmd.execute(),
        Commands::Engine(cmd) => runtime().and_then(|rt| rt.block_on(cmd.execute())),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Server(format!("Failed to create tokio runtime: {e}")))
}
