//! OCR provider abstraction.
//!
//! The handler only sees [`OcrProvider`]; the Mistral backend lives in
//! [`mistral`].

pub mod mistral;

use std::path::Path;

use crate::error::Result;

/// Returned in place of an empty string when no page produced markdown.
pub const NO_TEXT_EXTRACTED: &str = "No text extracted from document.";

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Turn the stored file at `path` into one markdown string.
    async fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Join per-page markdown in page order with a blank line between pages.
///
/// Pages without markdown are skipped. If nothing is left the
/// [`NO_TEXT_EXTRACTED`] sentinel is returned.
pub fn join_page_markdown<'a, I>(pages: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let joined = pages
        .into_iter()
        .flatten()
        .filter(|md| !md.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.is_empty() {
        NO_TEXT_EXTRACTED.to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_preserves_order() {
        let md = join_page_markdown(vec![Some("# Page 1"), Some("Page 2 body")]);
        assert_eq!(md, "# Page 1\n\nPage 2 body");
    }

    #[test]
    fn test_join_skips_missing_pages() {
        let md = join_page_markdown(vec![Some("first"), None, Some(""), Some("last")]);
        assert_eq!(md, "first\n\nlast");
    }

    #[test]
    fn test_join_empty_returns_sentinel() {
        assert_eq!(join_page_markdown(Vec::new()), NO_TEXT_EXTRACTED);
        assert_eq!(join_page_markdown(vec![None, Some("")]), NO_TEXT_EXTRACTED);
    }
}
