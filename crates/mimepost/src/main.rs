//! `MimePost` command-line front end.

#![forbid(unsafe_code)]

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mimepost")]
#[command(version)]
#[command(about = "Build MIME email and send it over SMTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a message and send it
    Send(MessageArgs),
    /// Build a message and print it without sending
    Preview {
        #[command(flatten)]
        message: MessageArgs,
        /// Print the part layout instead of the raw message
        #[arg(long)]
        summary: bool,
    },
}

/// Message contents shared by every subcommand.
#[derive(Args)]
struct MessageArgs {
    /// Recipient address (repeatable)
    #[arg(long = "to", value_name = "ADDRESS")]
    to: Vec<String>,
    /// Subject line
    #[arg(long, default_value = "")]
    subject: String,
    /// Plain-text body
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,
    /// File holding the plain-text body
    #[arg(long, value_name = "FILE")]
    text_file: Option<PathBuf>,
    /// File holding the HTML body
    #[arg(long, value_name = "FILE")]
    html_file: Option<PathBuf>,
    /// File to attach (must live under the configured attachment root)
    #[arg(long, value_name = "PATH")]
    attach: Option<String>,
    /// Sender configuration file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so preview output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mimepost=info,mimepost_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send(message) => commands::send(&message).await,
        Commands::Preview { message, summary } => commands::preview(&message, summary),
    }
}
