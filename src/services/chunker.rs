//! Sentence-respecting chunking with trailing-sentence overlap.
//!
//! Chunking is a pure function of (pages, configuration): the same input
//! always produces identical chunk boundaries, which re-ingestion and the
//! tests rely on.

use crate::models::{Chunk, IngestionConfig, PageText};
use crate::utils::estimate_tokens;

/// Words whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "approx", "dept", "fig",
    "no", "vol", "inc", "ltd", "co", "eg", "e.g", "ie", "i.e", "et", "al", "cf", "pp", "a.m",
    "p.m",
];

#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    page: u32,
}

/// Splits page text into chunks bounded by an approximate token ceiling,
/// seeding each chunk with the tail sentences of the previous one.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_tokens: usize,
    overlap_sentences: usize,
}

impl Chunker {
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            max_tokens: config.chunk_max_tokens as usize,
            overlap_sentences: config.overlap_sentences as usize,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&IngestionConfig::default())
    }

    /// Chunk a document's pages into ordered, overlapping chunks.
    pub fn chunk(&self, document_id: &str, pages: &[PageText]) -> Vec<Chunk> {
        let sentences: Vec<Sentence> = pages
            .iter()
            .flat_map(|page| {
                split_sentences(&page.text).into_iter().map(|text| Sentence {
                    text,
                    page: page.page_number,
                })
            })
            .collect();

        if sentences.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&Sentence> = Vec::new();
        let mut current_chars = 0usize;
        let mut overlap_leading = 0usize;
        let mut seq_index = 0u32;

        for sentence in &sentences {
            let sentence_chars = sentence.text.chars().count();
            let projected = if current.is_empty() {
                sentence_chars
            } else {
                current_chars + 1 + sentence_chars
            };

            if !current.is_empty() && projected / 4 > self.max_tokens {
                chunks.push(self.close(document_id, seq_index, &current, overlap_leading));
                seq_index += 1;

                // Seed the next chunk with the tail of the one just closed so
                // no semantic boundary is lost between chunks.
                let keep = self.overlap_sentences.min(current.len());
                current = current[current.len() - keep..].to_vec();
                overlap_leading = keep;
                current_chars = joined_chars(&current);
                current.push(sentence);
                current_chars = if current_chars == 0 {
                    sentence_chars
                } else {
                    current_chars + 1 + sentence_chars
                };
            } else {
                current.push(sentence);
                current_chars = projected;
            }
        }

        if !current.is_empty() {
            chunks.push(self.close(document_id, seq_index, &current, overlap_leading));
        }

        chunks
    }

    fn close(
        &self,
        document_id: &str,
        seq_index: u32,
        sentences: &[&Sentence],
        overlap_leading: usize,
    ) -> Chunk {
        let text = sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let token_count = estimate_tokens(&text) as u32;
        Chunk {
            id: Chunk::generate_id(document_id, seq_index),
            document_id: document_id.to_string(),
            page_start: sentences.first().map(|s| s.page).unwrap_or(1),
            page_end: sentences.last().map(|s| s.page).unwrap_or(1),
            text,
            seq_index,
            token_count,
            overlap_leading: overlap_leading as u32,
        }
    }
}

fn joined_chars(sentences: &[&Sentence]) -> usize {
    if sentences.is_empty() {
        return 0;
    }
    let chars: usize = sentences.iter().map(|s| s.text.chars().count()).sum();
    chars + sentences.len() - 1
}

/// Split text into sentences on terminal punctuation followed by whitespace
/// and a capital/digit, guarding against abbreviations and decimals.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '.' || c == '!' || c == '?' {
            // Closing quotes and brackets belong to the sentence.
            let mut end = i + 1;
            while end < chars.len()
                && matches!(chars[end], '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}')
            {
                end += 1;
            }

            if end < chars.len() && chars[end].is_whitespace() {
                let mut next = end;
                while next < chars.len() && chars[next].is_whitespace() {
                    next += 1;
                }
                let next_starts_sentence = next >= chars.len()
                    || chars[next].is_uppercase()
                    || chars[next].is_ascii_digit()
                    || matches!(chars[next], '"' | '\u{201c}' | '(');
                let guarded = c == '.' && ends_in_abbreviation(&chars[..i]);

                if next_starts_sentence && !guarded {
                    push_trimmed(&mut sentences, &chars[start..end]);
                    start = next;
                    i = next;
                    continue;
                }
            }
        }
        i += 1;
    }

    if start < chars.len() {
        push_trimmed(&mut sentences, &chars[start..]);
    }

    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, chars: &[char]) {
    let text: String = chars.iter().collect();
    let text = text.trim();
    if !text.is_empty() {
        sentences.push(text.to_string());
    }
}

/// True when the characters before a period end in a known abbreviation or a
/// single-letter initial.
fn ends_in_abbreviation(prefix: &[char]) -> bool {
    let word: String = prefix
        .iter()
        .rev()
        .take_while(|c| c.is_alphanumeric() || **c == '.')
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    let word = word.trim_matches('.').to_lowercase();
    if word.is_empty() {
        return false;
    }
    if word.chars().count() == 1 && word.chars().next().is_some_and(char::is_alphabetic) {
        return true;
    }
    ABBREVIATIONS.contains(&word.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngestionConfig;

    fn config(max_tokens: u32, overlap: u32) -> IngestionConfig {
        IngestionConfig {
            chunk_max_tokens: max_tokens,
            overlap_sentences: overlap,
            ..Default::default()
        }
    }

    fn page(n: u32, text: &str) -> PageText {
        PageText {
            page_number: n,
            text: text.to_string(),
        }
    }

    /// A paragraph of `n` distinct sentences, each ~10 tokens.
    fn paragraph(n: usize) -> String {
        (0..n)
            .map(|i| format!("Sentence number {i} carries some modest amount of content here."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_split_sentences_basic() {
        let sentences = split_sentences("First one here. Second one there! Third one? Done.");
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0], "First one here.");
        assert_eq!(sentences[2], "Third one?");
    }

    #[test]
    fn test_split_sentences_abbreviation_guard() {
        let sentences = split_sentences("Dr. Smith arrived at 3 p.m. carrying charts. Then he left.");
        assert!(sentences[0].starts_with("Dr. Smith"));
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_split_sentences_decimal_guard() {
        let sentences = split_sentences("The value was 3.14 exactly. Nobody objected.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].contains("3.14"));
    }

    #[test]
    fn test_split_sentences_numbered_reference_guard() {
        let sentences = split_sentences("See fig. 4 for details. The trend is clear.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].starts_with("See fig. 4"));
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunker = Chunker::with_defaults();
        let chunks = chunker.chunk("doc", &[page(1, "Just one short sentence.")]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].seq_index, 0);
        assert_eq!(chunks[0].overlap_leading, 0);
        assert_eq!(chunks[0].text, "Just one short sentence.");
    }

    #[test]
    fn test_empty_pages_no_chunks() {
        let chunker = Chunker::with_defaults();
        assert!(chunker.chunk("doc", &[]).is_empty());
        assert!(chunker.chunk("doc", &[page(1, "   ")]).is_empty());
    }

    #[test]
    fn test_token_ceiling_respected() {
        let chunker = Chunker::new(&config(80, 2));
        let chunks = chunker.chunk("doc", &[page(1, &paragraph(30))]);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.token_count <= 80,
                "chunk {} has {} tokens",
                chunk.seq_index,
                chunk.token_count
            );
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let overlap = 2usize;
        let chunker = Chunker::new(&config(60, overlap as u32));
        let chunks = chunker.chunk("doc", &[page(1, &paragraph(40))]);
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let prev = split_sentences(&pair[0].text);
            let next = split_sentences(&pair[1].text);
            assert_eq!(pair[1].overlap_leading as usize, overlap);
            assert_eq!(&prev[prev.len() - overlap..], &next[..overlap]);
        }
    }

    #[test]
    fn test_chunks_round_trip_modulo_overlap() {
        let chunker = Chunker::new(&config(50, 2));
        let text = paragraph(35);
        let chunks = chunker.chunk("doc", &[page(1, &text)]);

        let mut reconstructed: Vec<String> = Vec::new();
        for chunk in &chunks {
            let sentences = split_sentences(&chunk.text);
            reconstructed.extend(
                sentences
                    .into_iter()
                    .skip(chunk.overlap_leading as usize),
            );
        }
        assert_eq!(reconstructed.join(" "), text);
    }

    #[test]
    fn test_sequence_indices_monotone() {
        let chunker = Chunker::new(&config(50, 2));
        let chunks = chunker.chunk("doc", &[page(1, &paragraph(40))]);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq_index, i as u32);
        }
    }

    #[test]
    fn test_oversized_sentence_becomes_own_chunk() {
        let chunker = Chunker::new(&config(20, 2));
        let huge = format!("{}without any punctuation at all", "word ".repeat(60));
        let text = format!("{huge}. Short closer here. Another short line follows.");
        let chunks = chunker.chunk("doc", &[page(1, &text)]);

        // Never split mid-sentence: the oversized sentence is a chunk alone.
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].text, format!("{huge}."));
        assert!(chunks[0].token_count > 20);
    }

    #[test]
    fn test_page_range_metadata() {
        let chunker = Chunker::new(&config(1000, 2));
        let chunks = chunker.chunk(
            "doc",
            &[page(1, &paragraph(3)), page(2, &paragraph(3)), page(3, &paragraph(3))],
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_start, 1);
        assert_eq!(chunks[0].page_end, 3);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let chunker = Chunker::new(&config(45, 2));
        let pages = [page(1, &paragraph(20)), page(2, &paragraph(20))];
        let first = chunker.chunk("doc", &pages);
        let second = chunker.chunk("doc", &pages);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.text, b.text);
            assert_eq!(a.page_start, b.page_start);
        }
    }
}
