//! PDF text extraction: raw bytes in, cleaned page-tagged text out.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExtractError;
use crate::models::PageText;
use crate::utils::has_text;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BARE_PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\s*$").unwrap());

/// Extract cleaned text from every page of a PDF.
///
/// Pages that contain no text after cleanup are skipped. If the whole
/// document comes out blank (a pure image scan, say) that is an error, not a
/// silently empty index.
pub fn extract(bytes: &[u8]) -> Result<Vec<PageText>, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ExtractError::UnreadablePdf(e.to_string()))?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(ExtractError::UnreadablePdf("no pages".to_string()));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page_number in page_numbers {
        // Embedded fonts and odd encodings make single pages fail; a failed
        // page is treated as blank rather than failing the document.
        let raw = doc.extract_text(&[page_number]).unwrap_or_default();
        let cleaned = clean_text(&raw);
        if has_text(&cleaned) {
            pages.push(PageText {
                page_number,
                text: cleaned,
            });
        }
    }

    if pages.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }

    tracing::debug!(pages = pages.len(), "extracted text from PDF");
    Ok(pages)
}

/// Total page count of a PDF that already passed [`extract`]'s parse.
pub fn page_count(bytes: &[u8]) -> u32 {
    lopdf::Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len() as u32)
        .unwrap_or(0)
}

/// Normalize extractor output: strip control characters, drop standalone
/// page-number lines (running headers/footers), collapse whitespace runs.
fn clean_text(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let without_page_numbers = BARE_PAGE_NUMBER.replace_all(&stripped, "");
    WHITESPACE_RUN
        .replace_all(&without_page_numbers, " ")
        .trim()
        .to_string()
}

/// Minimal valid PDF with one page per input string. Builds body then xref
/// with correct byte offsets so lopdf can parse it. Test fixture shared by
/// the pipeline tests.
#[cfg(test)]
pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    let font_obj = 3 + 2 * n;
    for (i, text) in pages.iter().enumerate() {
        let page_obj = 3 + 2 * i;
        let content_obj = page_obj + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{page_obj} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Contents {content_obj} 0 R /Resources << /Font << /F1 {font_obj} 0 R >> >> >> endobj\n"
            )
            .as_bytes(),
        );
        let escaped = text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
        let stream = format!("BT /F1 12 Tf 72 720 Td ({escaped}) Tj ET");
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{content_obj} 0 obj << /Length {} >> stream\n{stream}\nendstream endobj\n",
                stream.len()
            )
            .as_bytes(),
        );
    }

    offsets.push(out.len());
    out.extend_from_slice(
        format!("{font_obj} 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n")
            .as_bytes(),
    );

    let total_objs = font_obj + 1;
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {total_objs}\n").as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {total_objs} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n")
            .as_bytes(),
    );
    out
}
