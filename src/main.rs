//! Unified veil CLI.
//!
//! - `veil server` - Run the tunnel endpoint
//! - `veil subscription` - Print the base64 subscription body and exit
//!
//! `veil-server` is also available as a standalone binary.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// veil unified CLI.
#[derive(Parser)]
#[command(
    name = "veil",
    version,
    about = "WebSocket tunnel endpoint speaking Vless and Trojan",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tunnel server.
    #[command(name = "server", alias = "serve")]
    Server(Box<veil_server::ServerArgs>),

    /// Print the subscription body for the configured node.
    #[command(name = "subscription", alias = "sub")]
    Subscription(Box<veil_server::ServerArgs>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server(args) => veil_server::cli::run(*args).await,
        Commands::Subscription(args) => veil_server::cli::print_subscription(*args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
