//! stripmill-cli - Command-line client for stripmill
//!
//! Sends a batch of image files to a server and writes the processed images
//! to disk.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use stripmill_client::{Client, ClientConfig};
use stripmill_protocol::OperationField;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stripmill-cli")]
#[command(about = "Command-line client for the stripmill image server")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:12345", env = "STRIPMILL_SERVER")]
    server: SocketAddr,

    /// Operation field framing: fixed or single_read (must match the server)
    #[arg(long, default_value = "fixed", value_parser = parse_operation_field)]
    operation_field: OperationField,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process image files on the server
    Process {
        /// Operation name (see `operations`)
        #[arg(short, long)]
        operation: String,

        /// Resize every image to WIDTHxHEIGHT before sending
        #[arg(long)]
        resize: Option<String>,

        /// Directory for processed_<i>.png outputs
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Image files to send, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List the operations the server knows
    Operations,
}

fn parse_operation_field(s: &str) -> Result<OperationField, String> {
    OperationField::parse(s).ok_or_else(|| format!("unknown operation field mode: {}", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::new(cli.server)
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout))
        .with_operation_field(cli.operation_field);
    let client = Client::new(config);

    match commands::execute(&client, cli.command).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
