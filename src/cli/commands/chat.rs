//! Interactive chat loop.
//!
//! History lives in this session only and is passed into every ask. A user
//! turn is committed to the visible transcript only after its answer
//! arrives, so a failed question never leaves an orphaned entry.

use std::io::{BufRead, Write};

use anyhow::Result;
use clap::Args;

use crate::models::{AskOutcome, Config, ConversationTurn};
use crate::services::Pipeline;

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Scope the conversation to one document by filename
    #[arg(long, short = 'd')]
    pub document: Option<String>,
}

pub async fn handle_chat(args: ChatArgs, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let pipeline = Pipeline::from_config(config).await?;

    let status = pipeline.status().await;
    if !status.has_content {
        println!("No document loaded. Ingest a PDF first with: pdfchat ingest <file.pdf>");
        return Ok(());
    }

    if verbose {
        eprintln!(
            "Chatting over {} document(s), {} chunks",
            status.document_count, status.chunk_count
        );
    }
    println!("Ask questions about your document. Type 'exit' to quit.");

    let stdin = std::io::stdin();
    let mut history: Vec<ConversationTurn> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match pipeline
            .ask(question, &history, args.document.as_deref())
            .await
        {
            Ok(AskOutcome::Answer { text, .. }) => {
                println!("\n{text}\n");
                history.push(ConversationTurn::user(question));
                history.push(ConversationTurn::assistant(text));
            }
            Ok(outcome) => {
                // Not an answer; the turn is not added to the transcript.
                println!("\n{}\n", outcome.display_text());
            }
            Err(e) => {
                eprintln!("\nError: {e}\n");
            }
        }
    }

    Ok(())
}
