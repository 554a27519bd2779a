//! Text helpers shared by the extractor and chunker.

/// Approximate token count: ~4 characters per token on average.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Minimum non-whitespace characters for a page to count as having text.
pub const MIN_PAGE_CONTENT: usize = 1;

/// Check that text contains something beyond whitespace.
pub fn has_text(content: &str) -> bool {
    content.chars().filter(|c| !c.is_whitespace()).count() >= MIN_PAGE_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("1234"), 1);
        assert_eq!(estimate_tokens("12345678"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_has_text() {
        assert!(!has_text(""));
        assert!(!has_text("   \n\t  "));
        assert!(has_text("a"));
    }
}
