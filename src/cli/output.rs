use std::fmt::Write as FmtWrite;

use serde::{Deserialize, Serialize};

use crate::models::{AskOutcome, IngestReport, StatusReport};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Infrastructure view shown by the status command, alongside the
/// pipeline's own document report.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_model: String,
    pub completion_model: String,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub report: StatusReport,
}

pub trait Formatter {
    fn format_answer(&self, outcome: &AskOutcome) -> String;
    fn format_ingest_report(&self, report: &IngestReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, outcome: &AskOutcome) -> String {
        let mut output = String::new();
        writeln!(output, "{}", outcome.display_text()).unwrap();
        if let AskOutcome::Answer { sources, .. } = outcome
            && !sources.is_empty()
        {
            writeln!(output).unwrap();
            writeln!(output, "Sources:").unwrap();
            for scored in sources {
                let pages = if scored.chunk.page_start == scored.chunk.page_end {
                    format!("page {}", scored.chunk.page_start)
                } else {
                    format!("pages {}-{}", scored.chunk.page_start, scored.chunk.page_end)
                };
                writeln!(
                    output,
                    "  [{:.3}] chunk {} ({})",
                    scored.score, scored.chunk.seq_index, pages
                )
                .unwrap();
            }
        }
        output
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        writeln!(output, "Document: {}", report.filename).unwrap();
        writeln!(output, "Pages:    {}", report.pages).unwrap();
        writeln!(output, "Chunks:   {}", report.chunks).unwrap();
        writeln!(output, "Duration: {}ms", report.duration_ms).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(output, "Embedding:   {} ({})", status.embedding_model, status.embedding_url)
            .unwrap();
        writeln!(output, "Completion:  {}", status.completion_model).unwrap();

        let vector_status = if status.vector_store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Vector Store: {} {} ({})",
            status.vector_store_driver, vector_status, status.vector_store_url
        )
        .unwrap();
        writeln!(output, "  Collection: {}", status.collection).unwrap();
        writeln!(output).unwrap();

        if status.report.documents.is_empty() {
            writeln!(output, "No documents ingested.").unwrap();
        } else {
            writeln!(
                output,
                "Documents: {} ready, {} chunks",
                status.report.document_count, status.report.chunk_count
            )
            .unwrap();
            for doc in &status.report.documents {
                writeln!(
                    output,
                    "  {} [{}] {} pages, {} chunks",
                    doc.filename, doc.status, doc.page_count, doc.chunk_count
                )
                .unwrap();
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap()
        } else {
            serde_json::to_string(value).unwrap()
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(&self, outcome: &AskOutcome) -> String {
        let json = serde_json::to_value(outcome)
            .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}));
        self.render(&json)
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let json = serde_json::to_value(report)
            .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}));
        self.render(&json)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "url": status.embedding_url,
                "model": status.embedding_model,
            },
            "completion": {
                "model": status.completion_model,
            },
            "vector_store": {
                "driver": status.vector_store_driver,
                "url": status.vector_store_url,
                "connected": status.vector_store_connected,
                "collection": status.collection,
            },
            "has_content": status.report.has_content,
            "document_count": status.report.document_count,
            "chunk_count": status.report.chunk_count,
            "documents": status.report.documents,
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
