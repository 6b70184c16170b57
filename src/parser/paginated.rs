//! Paginated (PDF) document parsing.
//!
//! Text extraction is feature-gated: builds without the `pdf` cargo feature
//! keep the type surface and report unavailability when a PDF path is first
//! touched, never at startup. Extracted text carries form-feed separators
//! between pages; structure recovery then runs on the page texts joined with
//! newlines, and a per-page line-anchored scan stamps article headers with
//! their 1-based page numbers.

use crate::errors::Result;
use crate::page_index::PageSource;
use crate::parser::text::StructurePatterns;
use crate::parser::{DocumentFormat, ParsedDocument};
use std::collections::HashMap;
use std::path::Path;

/// Extracted page texts of one paginated document
pub struct PdfPages {
    source: String,
    pages: Vec<String>,
}

impl PdfPages {
    /// Extract page texts from a PDF file
    #[cfg(feature = "pdf")]
    pub fn open(path: &Path) -> Result<Self> {
        let text = pdf_extract::extract_text(path).map_err(|e| {
            crate::errors::PipelineError::DocumentParsing {
                file: path.display().to_string(),
                details: format!("PDF text extraction failed: {}", e),
            }
        })?;
        Ok(Self {
            source: path.display().to_string(),
            pages: split_pages(&text),
        })
    }

    #[cfg(not(feature = "pdf"))]
    pub fn open(path: &Path) -> Result<Self> {
        Err(crate::errors::PipelineError::DependencyUnavailable {
            capability: "pdf".to_string(),
            details: format!(
                "cannot read '{}': built without the 'pdf' cargo feature",
                path.display()
            ),
        })
    }

    /// Wrap already-extracted page texts (fixtures, pre-split sources)
    pub fn from_pages(source: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            source: source.into(),
            pages,
        }
    }

    /// Page texts joined with newlines, the canonical full-text form
    pub fn joined_text(&self) -> String {
        self.pages.join("\n")
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PageSource for PdfPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        self.pages.get(index).cloned().ok_or_else(|| {
            crate::errors::PipelineError::PageScan {
                file: self.source.clone(),
                details: format!("page {} out of range ({} pages)", index, self.pages.len()),
            }
        })
    }
}

/// Parse a paginated document: structure from the joined text, pages stamped
/// from the per-page header scan.
pub fn parse(patterns: &StructurePatterns, pages: &PdfPages, fallback_title: &str) -> ParsedDocument {
    let full_text = pages.joined_text();
    let mut articles = patterns.extract_articles(&full_text);
    let chapters = patterns.extract_chapters(&full_text);

    let page_map = article_page_map(patterns, pages);
    for article in &mut articles {
        article.page = page_map.get(&article.number).copied();
    }

    tracing::debug!(
        "Paginated parse of '{}': {} pages, {} articles mapped",
        pages.source(),
        pages.pages.len(),
        page_map.len()
    );

    ParsedDocument {
        title: fallback_title.to_string(),
        format: DocumentFormat::Pdf,
        full_text,
        chapters,
        articles,
    }
}

/// Map each article number to the first page whose text starts a line with
/// its header. First occurrence wins; later repeats (continuation headers,
/// tables of contents at the back) never overwrite.
pub fn article_page_map(patterns: &StructurePatterns, pages: &PdfPages) -> HashMap<String, u32> {
    let mut map = HashMap::new();
    for (idx, page) in pages.pages.iter().enumerate() {
        for number in patterns.page_header_numbers(page) {
            map.entry(number).or_insert(idx as u32 + 1);
        }
    }
    map
}

/// Full scan for a single article's first page, bypassing any cache
pub fn find_article_page(
    patterns: &StructurePatterns,
    pages: &PdfPages,
    number: &str,
) -> Option<u32> {
    for (idx, page) in pages.pages.iter().enumerate() {
        if patterns.page_header_numbers(page).iter().any(|n| n == number) {
            return Some(idx as u32 + 1);
        }
    }
    None
}

/// Split extractor output on form feeds; a trailing separator leaves no
/// phantom page.
#[cfg(feature = "pdf")]
fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0C').map(|s| s.to_string()).collect();
    if pages.len() > 1 && pages.last().map(|p| p.trim().is_empty()).unwrap_or(false) {
        pages.pop();
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> StructurePatterns {
        StructurePatterns::new().unwrap()
    }

    fn fixture() -> PdfPages {
        PdfPages::from_pages(
            "закон.pdf",
            vec![
                "Титульный лист".to_string(),
                "Статья 1. Предмет\nТекст первой статьи.".to_string(),
                "Продолжение текста.\nСтатья 2. Понятия\nТекст второй.".to_string(),
                "Статья 2. Понятия (продолжение)".to_string(),
            ],
        )
    }

    #[test]
    fn test_article_page_map_first_occurrence_wins() {
        let map = article_page_map(&patterns(), &fixture());
        assert_eq!(map.get("1"), Some(&2));
        assert_eq!(map.get("2"), Some(&3));
    }

    #[test]
    fn test_parse_stamps_pages() {
        let parsed = parse(&patterns(), &fixture(), "закон");
        assert_eq!(parsed.format, DocumentFormat::Pdf);
        assert_eq!(parsed.title, "закон");
        let first = parsed.articles.iter().find(|a| a.number == "1").unwrap();
        assert_eq!(first.page, Some(2));
    }

    #[test]
    fn test_find_article_page() {
        let pages = fixture();
        assert_eq!(find_article_page(&patterns(), &pages, "2"), Some(3));
        assert_eq!(find_article_page(&patterns(), &pages, "99"), None);
    }

    #[test]
    fn test_page_source_contract() {
        let pages = fixture();
        assert_eq!(pages.page_count(), 4);
        assert!(pages.page_text(1).unwrap().contains("Статья 1"));
        assert!(pages.page_text(10).is_err());
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_split_pages_drops_trailing_separator() {
        let pages = split_pages("первая\x0Cвторая\x0C");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], "первая");
    }
}
