//! Ingest command implementation.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::Config;
use crate::services::Pipeline;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Path to the PDF file to ingest
    #[arg(required = true)]
    pub path: PathBuf,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let path = args.path.canonicalize().context("invalid path")?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("path has no filename")?;
    let bytes = std::fs::read(&path).context("failed to read file")?;

    if verbose {
        eprintln!("Ingesting {} ({} bytes)", path.display(), bytes.len());
    }

    let pipeline = Pipeline::from_config(config).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Extracting, chunking and embedding {filename}..."));

    let result = pipeline.ingest(&filename, &bytes).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            print!("{}", formatter.format_ingest_report(&report));
            Ok(())
        }
        Err(e) => {
            eprint!("{}", formatter.format_error(&e.to_string()));
            std::process::exit(1);
        }
    }
}
