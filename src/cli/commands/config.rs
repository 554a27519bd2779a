//! Config command implementation.

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::Config;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Set a configuration value (e.g. `retrieval.top_k 8`)
    Set {
        /// Dotted key, e.g. embedding.model
        key: String,
        /// New value
        value: String,
    },
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, verbose: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Init { force } => handle_init(force, format, verbose),
        ConfigCommand::Set { key, value } => handle_set(&key, &value, format),
    }
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            if let Some(path) = Config::config_path() {
                println!("# {}", path.display());
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn handle_init(force: bool, format: OutputFormat, verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let path = Config::config_path().context("could not determine config directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save()?;
    if verbose {
        eprintln!("Wrote defaults for embedding, completion, vector store and retrieval.");
    }
    println!(
        "{}",
        formatter.format_message(&format!("Config written to {}", path.display()))
    );
    Ok(())
}

fn handle_set(key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = Config::load()?;

    match key {
        "embedding.url" => config.embedding.url = value.to_string(),
        "embedding.model" => config.embedding.model = value.to_string(),
        "embedding.dimension" => config.embedding.dimension = value.parse()?,
        "embedding.batch_size" => config.embedding.batch_size = value.parse()?,
        "embedding.concurrency" => config.embedding.concurrency = value.parse()?,
        "completion.url" => config.completion.url = value.to_string(),
        "completion.model" => config.completion.model = value.to_string(),
        "vector_store.driver" => {
            config.vector_store.driver = match value {
                "qdrant" => crate::models::VectorDriver::Qdrant,
                "memory" => crate::models::VectorDriver::Memory,
                other => anyhow::bail!("unknown vector store driver: {other}"),
            }
        }
        "vector_store.url" => config.vector_store.url = value.to_string(),
        "vector_store.collection" => config.vector_store.collection = value.to_string(),
        "ingestion.max_file_bytes" => config.ingestion.max_file_bytes = value.parse()?,
        "ingestion.chunk_max_tokens" => config.ingestion.chunk_max_tokens = value.parse()?,
        "ingestion.overlap_sentences" => config.ingestion.overlap_sentences = value.parse()?,
        "retrieval.top_k" => config.retrieval.top_k = value.parse()?,
        "retrieval.min_score" => config.retrieval.min_score = value.parse()?,
        "retrieval.history_turns" => config.retrieval.history_turns = value.parse()?,
        "server.bind" => config.server.bind = value.to_string(),
        other => anyhow::bail!("unknown config key: {other}"),
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid value: {e}"))?;
    config.save()?;
    println!("{}", formatter.format_message(&format!("{key} = {value}")));
    Ok(())
}
