//! CLI module for pdfchat.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::cli::output::OutputFormat;

/// Chat with your PDFs: retrieval-augmented question answering.
#[derive(Debug, Parser)]
#[command(name = "pdfchat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a PDF into the vector index
    Ingest(commands::IngestArgs),

    /// Ask a single question about ingested content
    Ask(commands::AskArgs),

    /// Interactive question-answering session
    Chat(commands::ChatArgs),

    /// Show pipeline and infrastructure status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Run the HTTP API server
    Serve(commands::ServeArgs),
}
