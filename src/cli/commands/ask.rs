//! One-shot ask command.

use anyhow::Result;
use clap::Args;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::Config;
use crate::services::Pipeline;

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Question to ask about the ingested document
    #[arg(required = true)]
    pub question: String,

    /// Scope the question to one document by filename
    #[arg(long, short = 'd')]
    pub document: Option<String>,

    /// Number of chunks to retrieve
    #[arg(long, short = 'k')]
    pub top_k: Option<u32>,

    /// Minimum similarity score threshold (0.0-1.0)
    #[arg(long)]
    pub min_score: Option<f32>,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let mut config = Config::load()?;
    if let Some(top_k) = args.top_k {
        if top_k == 0 {
            anyhow::bail!("top-k must be at least 1");
        }
        config.retrieval.top_k = top_k;
    }
    if let Some(score) = args.min_score {
        if !(0.0..=1.0).contains(&score) {
            anyhow::bail!("min-score must be between 0.0 and 1.0");
        }
        config.retrieval.min_score = score;
    }

    let formatter = get_formatter(format);

    if verbose {
        eprintln!("Question: \"{question}\"");
        eprintln!("  Top-k: {}", config.retrieval.top_k);
        eprintln!("  Min score: {:.3}", config.retrieval.min_score);
        if let Some(ref doc) = args.document {
            eprintln!("  Document: {doc}");
        }
    }

    let pipeline = Pipeline::from_config(config).await?;

    match pipeline.ask(question, &[], args.document.as_deref()).await {
        Ok(outcome) => {
            print!("{}", formatter.format_answer(&outcome));
            Ok(())
        }
        Err(e) => {
            eprint!("{}", formatter.format_error(&e.to_string()));
            std::process::exit(1);
        }
    }
}
