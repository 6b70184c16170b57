//! # Document Parsing Module
//!
//! ## Purpose
//! Structural parsing of legal source documents into a normalized in-memory
//! representation: document title, full text, chapter records and article
//! records, with page numbers where the source format is paginated.
//!
//! ## Input/Output Specification
//! - **Input**: A file path whose extension declares the format (`xml`, `html`,
//!   `pdf`, `txt`)
//! - **Output**: [`ParsedDocument`] with flat chapter/article lists in source
//!   order
//! - **Failure**: Unknown extensions are rejected up front; format-specific
//!   failures carry the file name and cause
//!
//! ## Key Features
//! - Extension-driven dispatch over a fixed format set, no content sniffing
//! - Tolerant markup traversal by tag name or class pattern
//! - Pattern-based structure recovery for plain and extracted text
//! - Page-aware parsing for paginated sources (feature `pdf`)

pub mod markup;
pub mod paginated;
pub mod text;

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use markup::MarkupParser;
use paginated::PdfPages;
use text::StructurePatterns;

/// Supported document formats, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Xml,
    Html,
    Pdf,
    Text,
}

impl DocumentFormat {
    /// Resolve a lowercase file extension to a format
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "xml" => Some(DocumentFormat::Xml),
            "html" => Some(DocumentFormat::Html),
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

/// Chapter-level structural record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// Chapter number as written in the source
    pub number: String,
    /// Chapter title, possibly empty
    pub title: String,
}

/// Article-level structural record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Article number as written in the source (`5`, `5.1`)
    pub number: String,
    /// Article body text
    pub text: String,
    /// 1-based page of the article header, when the source is paginated
    pub page: Option<u32>,
}

/// Normalized parse result for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Document title (markup `<title>` or the file stem)
    pub title: String,
    /// Source format the document was parsed as
    pub format: DocumentFormat,
    /// Complete text content
    pub full_text: String,
    /// Chapters in source order
    pub chapters: Vec<ChapterRecord>,
    /// Articles in source order
    pub articles: Vec<ArticleRecord>,
}

/// Structural parser over the supported document formats
pub struct DocumentParser {
    markup: MarkupParser,
    structure: StructurePatterns,
}

impl DocumentParser {
    /// Create a parser with all patterns compiled
    pub fn new() -> Result<Self> {
        Ok(Self {
            markup: MarkupParser::new()?,
            structure: StructurePatterns::new()?,
        })
    }

    /// Parse a document, dispatching on its file extension
    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let format = extension
            .as_deref()
            .and_then(DocumentFormat::from_extension)
            .ok_or_else(|| PipelineError::UnsupportedFormat {
                extension: extension.unwrap_or_else(|| "(none)".to_string()),
            })?;

        let stem = file_stem(path);
        tracing::debug!("Parsing {:?} as {:?}", path, format);

        match format {
            DocumentFormat::Xml | DocumentFormat::Html => {
                let raw = read_lossy(path)?;
                Ok(self.markup.parse(&raw, &stem, format))
            }
            DocumentFormat::Text => {
                let content = read_lossy(path)?;
                Ok(ParsedDocument {
                    title: stem,
                    format: DocumentFormat::Text,
                    chapters: self.structure.extract_chapters(&content),
                    articles: self.structure.extract_articles(&content),
                    full_text: content,
                })
            }
            DocumentFormat::Pdf => {
                let pages = PdfPages::open(path)?;
                Ok(paginated::parse(&self.structure, &pages, &stem))
            }
        }
    }

    /// Access the shared structure patterns (page scans, direct lookups)
    pub fn structure(&self) -> &StructurePatterns {
        &self.structure
    }
}

/// Pick a display title out of an article body: the first content line that is
/// not an editorial annotation, unless it runs on like body text.
pub fn extract_article_title(body: &str) -> Option<String> {
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lowered = line.to_lowercase();
        if lowered.contains("консультантплюс") || lowered.contains("consultant") {
            continue;
        }
        // Revision notes like "(в ред. Федерального закона ...)"
        if line.starts_with('(') && line.ends_with(')') && lowered.contains("ред.") {
            continue;
        }
        if line.chars().count() > 140 {
            return None;
        }
        return Some(line.to_string());
    }
    None
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::DocumentParsing {
        file: path.display().to_string(),
        details: format!("cannot read file: {}", e),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_extension_rejected() {
        let parser = DocumentParser::new().unwrap();
        let err = parser.parse(Path::new("document.docx")).unwrap_err();
        match err {
            PipelineError::UnsupportedFormat { extension } => assert_eq!(extension, "docx"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_extension_rejected() {
        let parser = DocumentParser::new().unwrap();
        assert!(matches!(
            parser.parse(Path::new("document")),
            Err(PipelineError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_plain_text_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("закон о тишине.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "Глава 1. Общие положения\n\
             Статья 1. Предмет регулирования\nНастоящий закон регулирует отношения.\n\
             Статья 2. Основные понятия\nВ настоящем законе используются понятия."
        )
        .unwrap();

        let parser = DocumentParser::new().unwrap();
        let parsed = parser.parse(&path).unwrap();

        assert_eq!(parsed.format, DocumentFormat::Text);
        assert_eq!(parsed.title, "закон о тишине");
        assert_eq!(parsed.chapters.len(), 1);
        assert_eq!(parsed.articles.len(), 2);
        assert_eq!(parsed.articles[0].number, "1");
        assert!(parsed.articles[0].text.contains("регулирует"));
        assert_eq!(parsed.articles[1].number, "2");
    }

    #[test]
    fn test_extract_article_title() {
        let body = "\nКонсультантПлюс: примечание\n(в ред. Федерального закона от 01.01.2020)\nОсновные понятия\nТекст статьи.";
        assert_eq!(
            extract_article_title(body),
            Some("Основные понятия".to_string())
        );

        let run_on = "п".repeat(141);
        assert_eq!(extract_article_title(&run_on), None);

        assert_eq!(extract_article_title("   \n\n"), None);
    }
}
