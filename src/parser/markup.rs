//! Markup (HTML/XML) structure extraction.
//!
//! Source markup is inconsistently authored, so the traversal is tolerant:
//! the whole tree is parsed with an error-recovering HTML parser and
//! structural elements are recognized either by tag name (`chapter`,
//! `article`) or by a class token matching the chapter/article vocabulary in
//! either language. Element numbers come from a `number` attribute, then an
//! `id` attribute, then the element's position.

use crate::errors::{PipelineError, Result};
use crate::parser::{ArticleRecord, ChapterRecord, DocumentFormat, ParsedDocument};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub struct MarkupParser {
    chapter_class: Regex,
    article_class: Regex,
    doc_title: Selector,
}

impl MarkupParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            chapter_class: compile(r"(?i)chapter|глава")?,
            article_class: compile(r"(?i)article|статья")?,
            doc_title: Selector::parse("title").map_err(|e| PipelineError::Internal {
                message: format!("Invalid title selector: {}", e),
            })?,
        })
    }

    /// Parse markup into the normalized document shape. Never fails: malformed
    /// markup degrades to whatever structure the recovering parser yields.
    pub fn parse(&self, raw: &str, fallback_title: &str, format: DocumentFormat) -> ParsedDocument {
        let doc = Html::parse_document(raw);

        let title = doc
            .select(&self.doc_title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback_title.to_string());

        let mut chapters = Vec::new();
        let mut articles = Vec::new();

        for node in doc.tree.nodes() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            let name = el.value().name();

            if name == "chapter" || self.has_class_matching(&el, &self.chapter_class) {
                let number = element_number(&el, chapters.len());
                chapters.push(ChapterRecord {
                    number,
                    title: chapter_title(&el),
                });
            } else if name == "article" || self.has_class_matching(&el, &self.article_class) {
                let number = element_number(&el, articles.len());
                articles.push(ArticleRecord {
                    number,
                    text: element_text(el),
                    page: None,
                });
            }
        }

        tracing::debug!(
            "Markup parse: {} chapters, {} articles",
            chapters.len(),
            articles.len()
        );

        ParsedDocument {
            title,
            format,
            full_text: element_text(doc.root_element()),
            chapters,
            articles,
        }
    }

    fn has_class_matching(&self, el: &ElementRef, pattern: &Regex) -> bool {
        el.value().classes().any(|c| pattern.is_match(c))
    }
}

/// Number from `number`/`id` attributes, else the element's 1-based position
fn element_number(el: &ElementRef, position: usize) -> String {
    el.value()
        .attr("number")
        .or_else(|| el.value().attr("id"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| (position + 1).to_string())
}

/// First `title`/`h2`/`h3` descendant, else the `title` attribute, else empty
fn chapter_title(el: &ElementRef) -> String {
    for node in el.descendants() {
        if node.id() == el.id() {
            continue;
        }
        let Some(child) = ElementRef::wrap(node) else {
            continue;
        };
        let name = child.value().name();
        if name == "title" || name == "h2" || name == "h3" {
            let text = element_text(child);
            if !text.is_empty() {
                return text;
            }
        }
    }
    el.value()
        .attr("title")
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PipelineError::Internal {
        message: format!("Invalid markup class pattern: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> MarkupParser {
        MarkupParser::new().unwrap()
    }

    #[test]
    fn test_parse_class_annotated_html() {
        let html = r#"
            <html><head><title>Закон о связи</title></head><body>
                <div class="глава" number="1"><h2>Общие положения</h2>
                    <div class="статья" number="1">Сфера действия закона.</div>
                    <div class="статья" number="2">Основные понятия.</div>
                </div>
            </body></html>"#;

        let parsed = parser().parse(html, "fallback", DocumentFormat::Html);
        assert_eq!(parsed.title, "Закон о связи");
        assert_eq!(parsed.chapters.len(), 1);
        assert_eq!(parsed.chapters[0].number, "1");
        assert_eq!(parsed.chapters[0].title, "Общие положения");
        assert_eq!(parsed.articles.len(), 2);
        assert_eq!(parsed.articles[1].number, "2");
        assert_eq!(parsed.articles[1].text, "Основные понятия.");
    }

    #[test]
    fn test_parse_tag_named_xml() {
        let xml = r#"
            <law><chapter number="3"><title>Ответственность</title>
                <article number="12">Нарушение требований закона.</article>
            </chapter></law>"#;

        let parsed = parser().parse(xml, "закон", DocumentFormat::Xml);
        assert_eq!(parsed.chapters.len(), 1);
        assert_eq!(parsed.chapters[0].number, "3");
        assert_eq!(parsed.articles.len(), 1);
        assert_eq!(parsed.articles[0].number, "12");
        assert!(parsed.articles[0].text.contains("Нарушение"));
    }

    #[test]
    fn test_title_falls_back_to_stem() {
        let parsed = parser().parse("<body><p>Без структуры</p></body>", "устав", DocumentFormat::Html);
        assert_eq!(parsed.title, "устав");
        assert!(parsed.chapters.is_empty());
        assert!(parsed.articles.is_empty());
        assert!(parsed.full_text.contains("Без структуры"));
    }

    #[test]
    fn test_number_falls_back_to_position() {
        let html = r#"<div class="article">Первая.</div><div class="article">Вторая.</div>"#;
        let parsed = parser().parse(html, "doc", DocumentFormat::Html);
        assert_eq!(parsed.articles.len(), 2);
        assert_eq!(parsed.articles[0].number, "1");
        assert_eq!(parsed.articles[1].number, "2");
    }
}
