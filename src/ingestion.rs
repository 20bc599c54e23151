use crate::error::{ExtractionError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Terms padded with spaces so that label patterns find clean word boundaries
/// even when the source layout glued them to neighbouring tokens.
const FINANCIAL_TERMS: &[&str] = &[
    "revenue",
    "total revenue",
    "sales",
    "net sales",
    "cost of revenue",
    "cost of goods sold",
    "cogs",
    "gross profit",
    "gross margin",
    "operating expenses",
    "total operating expenses",
    "opex",
    "operating income",
    "operating profit",
    "ebit",
    "net income",
    "net profit",
    "net earnings",
    "research and development",
    "r&d",
    "selling, general and administrative",
    "sg&a",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static TERM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    FINANCIAL_TERMS
        .iter()
        .map(|term| {
            Regex::new(&format!(r"(?i)(\b{}\b)", regex::escape(term)))
                .expect("financial term pattern is valid")
        })
        .collect()
});

/// Backend turning a binary document into plain text, one entry per page in
/// reading order.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, document: &[u8]) -> Result<Vec<String>>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Treats the input as already-extracted text. Form feeds separate pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_pages(&self, document: &[u8]) -> Result<Vec<String>> {
        if document.is_empty() {
            return Err(ExtractionError::TextExtraction(
                "document is empty".to_string(),
            ));
        }
        let text = String::from_utf8_lossy(document);
        Ok(text.split('\u{000C}').map(str::to_string).collect())
    }

    fn backend_name(&self) -> &str {
        "plain-text"
    }
}

/// Concatenates pages in order with a blank line between them.
pub fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page);
        text.push_str("\n\n");
    }
    text
}

/// Collapses whitespace runs and pads known financial terms with spaces.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = WHITESPACE.replace_all(text, " ").into_owned();
    for pattern in TERM_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, " ${1} ").into_owned();
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        let cleaned = clean_text("Net\n\n  Income:\t50");
        assert!(!cleaned.contains('\n'));
        assert!(!cleaned.contains('\t'));
        assert!(cleaned.contains("Income"));
    }

    #[test]
    fn test_clean_text_pads_terms() {
        let cleaned = clean_text("Item:Revenue:100");
        assert!(cleaned.contains(" Revenue "));

        let cleaned = clean_text("R&D:40");
        assert!(cleaned.contains(" R&D "));
    }

    #[test]
    fn test_plain_text_extractor_splits_pages() {
        let pages = PlainTextExtractor
            .extract_pages(b"page one\x0cpage two")
            .unwrap();
        assert_eq!(pages, vec!["page one".to_string(), "page two".to_string()]);
        assert_eq!(join_pages(&pages), "page one\n\npage two\n\n");
    }

    #[test]
    fn test_plain_text_extractor_rejects_empty_input() {
        assert!(matches!(
            PlainTextExtractor.extract_pages(b""),
            Err(ExtractionError::TextExtraction(_))
        ));
    }
}
