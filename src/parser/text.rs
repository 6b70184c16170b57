//! Plain-text structure recovery.
//!
//! Articles and chapters are recovered purely by header patterns: a header
//! keyword (`Статья`, `Глава`) followed by a number opens an element whose
//! body runs until the next header of the boundary set or the end of input.
//! Chapter titles are capped at 100 characters; anything longer is body text
//! that leaked past a missing boundary.

use crate::errors::{PipelineError, Result};
use crate::parser::{ArticleRecord, ChapterRecord};
use crate::utils::TextUtils;
use regex::Regex;

/// Maximum characters kept from a chapter title capture
const CHAPTER_TITLE_MAX_CHARS: usize = 100;

/// Compiled header patterns shared by the plain-text and paginated paths
pub struct StructurePatterns {
    article_header: Regex,
    chapter_header: Regex,
    page_header: Regex,
}

impl StructurePatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // "Статья 5." / "Статья 5.1" with the trailing dot and spacing
            // consumed so bodies start at the content
            article_header: compile(r"(?i)Статья\s+(\d+(?:\.\d+)?)\.?\s*")?,
            chapter_header: compile(r"(?i)Глава\s+(\d+)\s*[\.\-]?\s*")?,
            // Line-anchored form used for page scans; in-body citations like
            // "в статье 5" never start a line with the keyword
            page_header: compile(r"(?m)^\s*Статья\s+(\d+(?:\.\d+)?)\b")?,
        })
    }

    /// Recover articles: each header opens a body that runs to the next
    /// article header or the end of input.
    pub fn extract_articles(&self, text: &str) -> Vec<ArticleRecord> {
        let headers: Vec<(usize, usize, String)> = self
            .article_header
            .captures_iter(text)
            .map(|c| {
                let m = c.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
                (m.0, m.1, c[1].to_string())
            })
            .collect();

        let mut articles = Vec::with_capacity(headers.len());
        for (i, (_, body_start, number)) in headers.iter().enumerate() {
            let body_end = headers.get(i + 1).map(|h| h.0).unwrap_or(text.len());
            let body = text[*body_start..body_end].trim();
            articles.push(ArticleRecord {
                number: number.clone(),
                text: body.to_string(),
                page: None,
            });
        }
        articles
    }

    /// Recover chapters: a title capture runs to the next chapter or article
    /// header, whichever comes first, and is truncated to the title cap.
    pub fn extract_chapters(&self, text: &str) -> Vec<ChapterRecord> {
        let article_starts: Vec<usize> = self
            .article_header
            .find_iter(text)
            .map(|m| m.start())
            .collect();
        let chapter_headers: Vec<(usize, usize, String)> = self
            .chapter_header
            .captures_iter(text)
            .map(|c| {
                let m = c.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
                (m.0, m.1, c[1].to_string())
            })
            .collect();

        let mut chapters = Vec::with_capacity(chapter_headers.len());
        for (i, (_, title_start, number)) in chapter_headers.iter().enumerate() {
            let next_chapter = chapter_headers
                .get(i + 1)
                .map(|h| h.0)
                .unwrap_or(text.len());
            let next_article = article_starts
                .iter()
                .find(|&&s| s >= *title_start)
                .copied()
                .unwrap_or(text.len());
            let title_end = next_chapter.min(next_article);
            let title = text[*title_start..title_end].trim();
            chapters.push(ChapterRecord {
                number: number.clone(),
                title: TextUtils::truncate_chars(title, CHAPTER_TITLE_MAX_CHARS)
                    .trim_end()
                    .to_string(),
            });
        }
        chapters
    }

    /// Article numbers whose line-anchored headers appear in one page of text,
    /// in order of appearance.
    pub fn page_header_numbers(&self, page_text: &str) -> Vec<String> {
        self.page_header
            .captures_iter(page_text)
            .map(|c| c[1].to_string())
            .collect()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PipelineError::Internal {
        message: format!("Invalid structure pattern: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> StructurePatterns {
        StructurePatterns::new().unwrap()
    }

    #[test]
    fn test_extract_two_articles() {
        let text = "Статья 1. Предмет\nТело первой статьи.\nСтатья 2. Понятия\nТело второй.";
        let articles = patterns().extract_articles(text);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].number, "1");
        assert_eq!(articles[0].text, "Предмет\nТело первой статьи.");
        assert_eq!(articles[1].number, "2");
        assert_eq!(articles[1].text, "Понятия\nТело второй.");
    }

    #[test]
    fn test_decimal_article_numbers() {
        let text = "Статья 15.1. Специальная норма\nТекст.\nСтатья 16 Общая норма\nЕщё текст.";
        let articles = patterns().extract_articles(text);
        assert_eq!(articles[0].number, "15.1");
        assert_eq!(articles[0].text, "Специальная норма\nТекст.");
        assert_eq!(articles[1].number, "16");
    }

    #[test]
    fn test_header_case_insensitive() {
        let articles = patterns().extract_articles("СТАТЬЯ 3. Текст нормы");
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].number, "3");
    }

    #[test]
    fn test_no_structure_yields_empty() {
        assert!(patterns().extract_articles("Обычный текст без структуры").is_empty());
        assert!(patterns().extract_chapters("Обычный текст").is_empty());
    }

    #[test]
    fn test_chapter_title_stops_at_article() {
        let text = "Глава 2. Права граждан\nСтатья 5. Право на обращение\nТекст.";
        let chapters = patterns().extract_chapters(text);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].number, "2");
        assert_eq!(chapters[0].title, "Права граждан");
    }

    #[test]
    fn test_chapter_title_truncated() {
        let long_title = "о ".repeat(80);
        let text = format!("Глава 1. {}", long_title);
        let chapters = patterns().extract_chapters(&text);
        assert_eq!(chapters.len(), 1);
        assert!(chapters[0].title.chars().count() <= 100);
    }

    #[test]
    fn test_page_header_ignores_inline_citations() {
        let page = "В соответствии со статьей 10 настоящего закона.\nСтатья 11. Заключительные положения";
        let numbers = patterns().page_header_numbers(page);
        assert_eq!(numbers, vec!["11".to_string()]);
    }
}
