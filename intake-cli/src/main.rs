//! intake CLI tool

#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use console::style;
use intake_cli_lib::{ConfigCommand, ServeCommand, TokenCommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "intake")]
#[command(version)]
#[command(about = "Validated image upload service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the upload service
    Serve {
        /// Configuration file (skips the standard search locations)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Listen address, e.g. 0.0.0.0:3000
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Issue a client upload token for the remote blob store
    Token {
        /// Original filename of the file to upload
        pathname: String,
        /// Content type of the file, e.g. image/png
        #[arg(short = 't', long)]
        content_type: String,
        /// Opaque value echoed back on completion
        #[arg(long)]
        payload: Option<String>,
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the resolved configuration
    Config {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, bind } => ServeCommand::new(config, bind).execute().await,
        Commands::Token {
            pathname,
            content_type,
            payload,
            config,
        } => TokenCommand {
            pathname,
            content_type,
            client_payload: payload,
            config,
        }
        .execute(),
        Commands::Config { config } => ConfigCommand { config }.execute(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
