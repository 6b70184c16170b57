//! # Document Ingestion Pipeline
//!
//! ## Purpose
//! Orchestrates the complete ingestion workflow for one legal document:
//! structural parsing, linguistic analysis, graph population and persistence.
//!
//! ## Input/Output Specification
//! - **Input**: Path to a source document in a supported format
//! - **Output**: [`IngestionSummary`] with entity counts and analysis results
//! - **Workflow**: Parse → Identify → Populate → Analyze → Link → Save
//!
//! ## Key Features
//! - Deterministic law identifiers derived from the source file name
//! - Chapter/article containment via the last-seen-chapter assignment
//! - Term linking driven by per-article lemma sequences, with definition
//!   detection for terms introduced at the head of an article
//! - Document-scoped reference resolution by article number
//!
//! ## Usage
//! ```rust,ignore
//! let mut pipeline = DocumentPipeline::new(&config)?;
//! let summary = pipeline.ingest(Path::new("кодекс.txt"))?;
//! println!("{} articles", summary.articles);
//! ```

use crate::analysis::{ExtractedEntities, KeyTerm, ReferencePhrase, TextAnalyzer};
use crate::config::Config;
use crate::errors::{PipelineError, Result};
use crate::ontology::OntologyStore;
use crate::parser::DocumentParser;
use crate::time_block;
use crate::utils::TextUtils;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Leading fraction of an article body treated as its definition zone: a key
/// term first seen there is recorded as defined, not merely used
const DEFINITION_ZONE_RATIO: f64 = 0.1;

/// Ingestion result for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSummary {
    /// Law identifier derived from the source file name
    pub law_id: String,
    /// IRI the law was minted under
    pub law_iri: String,
    /// Chapters recovered from the document structure
    pub chapters: usize,
    /// Articles recovered from the document structure
    pub articles: usize,
    /// Key terms recorded as terminology entities
    pub terms: usize,
    /// Term-to-article links recorded (definitions and uses)
    pub term_links: usize,
    /// Article-to-article reference edges recorded
    pub reference_edges: usize,
    /// Entities extracted from the full text
    pub entities: ExtractedEntities,
    /// Cross-reference phrases detected in the full text
    pub references: Vec<ReferencePhrase>,
    /// Ranked key terms used for terminology entities
    pub key_terms: Vec<KeyTerm>,
    /// Where the graph was persisted
    pub graph_path: PathBuf,
    /// Wall-clock processing time
    pub elapsed_ms: u64,
    /// When the ingestion finished
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

/// Main ingestion pipeline over parser, analyzer and ontology store
pub struct DocumentPipeline {
    parser: DocumentParser,
    analyzer: TextAnalyzer,
    store: OntologyStore,
    number_token: Regex,
    key_terms_top_n: usize,
}

impl DocumentPipeline {
    /// Create a pipeline with all components configured
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            parser: DocumentParser::new()?,
            analyzer: TextAnalyzer::new(config.analysis.clone())?,
            store: OntologyStore::open(&config.ontology)?,
            number_token: Regex::new(r"\d+(?:\.\d+)?").map_err(|e| PipelineError::Internal {
                message: format!("Invalid reference number pattern: {}", e),
            })?,
            key_terms_top_n: config.analysis.key_terms_top_n,
        })
    }

    /// The ontology store backing this pipeline
    pub fn store(&self) -> &OntologyStore {
        &self.store
    }

    /// Ingest one document into the ontology and persist the graph.
    ///
    /// A failure at any stage propagates to the caller; stages already
    /// executed may have mutated the in-memory graph, but nothing reaches
    /// disk until the final save succeeds.
    pub fn ingest(&mut self, path: &Path) -> Result<IngestionSummary> {
        tracing::info!("Ingesting document: {}", path.display());
        let started = Instant::now();

        // Structural parse
        let parsed = time_block!("parse_document", { self.parser.parse(path) })?;
        if parsed.articles.is_empty() {
            tracing::warn!("No articles recovered from {}", path.display());
        }
        tracing::debug!(
            "Parsed '{}': {} chapters, {} articles, {} words",
            parsed.title,
            parsed.chapters.len(),
            parsed.articles.len(),
            TextUtils::word_count(&parsed.full_text)
        );

        // Law identity from the source name
        let law_id = derive_law_id(path);
        let law_iri = self.store.add_law(&law_id, &parsed.title, None);

        // Chapters in source order
        let mut last_chapter_iri: Option<String> = None;
        for chapter in &parsed.chapters {
            let chapter_id = format!("{}_chapter_{}", law_id, chapter.number);
            let iri =
                self.store
                    .add_chapter(&chapter_id, &chapter.number, &chapter.title, Some(&law_iri));
            last_chapter_iri = Some(iri);
        }

        // Articles, attached to the last chapter seen. Containment is a
        // coarse assignment, not a verified span check.
        let mut article_iris: IndexMap<String, String> = IndexMap::new();
        for article in &parsed.articles {
            let article_id = format!("{}_article_{}", law_id, article.number);
            let iri = self.store.add_article(
                &article_id,
                &article.number,
                (!article.text.is_empty()).then_some(article.text.as_str()),
                article.page,
                Some(&law_iri),
                last_chapter_iri.as_deref(),
            );
            article_iris.insert(article.number.clone(), iri);
        }

        // Linguistic analysis over the whole document
        let entities = self.analyzer.extract_entities(&parsed.full_text);
        let references = self.analyzer.extract_references(&parsed.full_text);
        let key_terms = time_block!("key_term_ranking", {
            self.analyzer.key_terms(&parsed.full_text, self.key_terms_top_n)
        });

        // Key terms become terminology entities
        let mut term_iris: IndexMap<String, String> = IndexMap::new();
        for key_term in &key_terms {
            let term_id = format!("term_{}", normalize_id(&key_term.term));
            let iri = self.store.add_term(&term_id, &key_term.term);
            term_iris.insert(key_term.term.clone(), iri);
        }

        // Link each article to the terms its lemma sequence contains
        let mut term_links = 0usize;
        for article in &parsed.articles {
            let article_iri = match article_iris.get(&article.number) {
                Some(iri) => iri.clone(),
                None => continue,
            };
            let lemmas = self.analyzer.lemmatize(&article.text);
            let body_lower = article.text.to_lowercase();
            let zone_chars =
                (body_lower.chars().count() as f64 * DEFINITION_ZONE_RATIO) as usize;
            for (term_text, term_iri) in &term_iris {
                if !lemmas.iter().any(|lemma| lemma == term_text) {
                    continue;
                }
                let is_definition = body_lower
                    .find(term_text.as_str())
                    .map_or(false, |byte| body_lower[..byte].chars().count() < zone_chars);
                self.store
                    .link_term_to_article(term_iri, &article_iri, is_definition);
                term_links += 1;
            }
        }
        tracing::debug!("Linked {} term occurrences to articles", term_links);

        // Resolve reference phrases to same-document articles. The edge is
        // added from every article because phrase positions are not mapped
        // back to their containing article.
        let mut reference_edges = 0usize;
        for reference in &references {
            let target_number = match self.number_token.find(&reference.text) {
                Some(m) => m.as_str(),
                None => continue,
            };
            let target_iri = match article_iris.get(target_number) {
                Some(iri) => iri.clone(),
                None => continue,
            };
            tracing::debug!(
                "Reference phrase '{}' resolved to article {}",
                TextUtils::preview(&reference.text, 40),
                target_number
            );
            for article_iri in article_iris.values() {
                self.store.add_reference(article_iri, Some(&target_iri), None);
                reference_edges += 1;
            }
        }

        // Persist the graph
        let graph_path = self.store.save(None)?;

        let summary = IngestionSummary {
            law_id,
            law_iri,
            chapters: parsed.chapters.len(),
            articles: article_iris.len(),
            terms: term_iris.len(),
            term_links,
            reference_edges,
            entities,
            references,
            key_terms,
            graph_path,
            elapsed_ms: started.elapsed().as_millis() as u64,
            ingested_at: chrono::Utc::now(),
        };

        tracing::info!(
            "Ingestion completed for '{}': {} chapters, {} articles, {} terms, {} term links, {} reference edges in {:.2}s",
            summary.law_id,
            summary.chapters,
            summary.articles,
            summary.terms,
            summary.term_links,
            summary.reference_edges,
            started.elapsed().as_secs_f64()
        );

        Ok(summary)
    }
}

/// Deterministic law identifier from the source file name
fn derive_law_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    normalize_id(stem)
}

/// Spaces and hyphens become underscores so identifiers survive IRI minting
fn normalize_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::{Node, OntologyStore};
    use std::io::Write;

    const SAMPLE_LAW: &str = "\
Глава 1. Общие положения
Статья 1. Тишина
Тишина означает отсутствие шума в жилых помещениях. Тишина охраняется законом.
Статья 2. Обязанности граждан
Настоящий документ определяет порядок и правила поведения граждан в жилых \
помещениях в ночное время. Контроль за исполнением требований осуществляют \
уполномоченные органы государственной власти и органы местного самоуправления. \
Жильцам гарантируется обеспечение тишины.
Статья 3. Ответственность
Нарушение требований влечёт ответственность согласно статье 1 настоящего документа.";

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.ontology.namespace = "http://law.test/#".to_string();
        config.ontology.graph_path = dir.join("law_ontology.rdf");
        config.analysis.key_terms_top_n = 10;
        config
    }

    fn write_law(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    fn ingest_sample(dir: &Path) -> (Config, IngestionSummary) {
        let config = test_config(dir);
        let path = write_law(dir, "закон о тишине.txt", SAMPLE_LAW);
        let mut pipeline = DocumentPipeline::new(&config).unwrap();
        let summary = pipeline.ingest(&path).unwrap();
        (config, summary)
    }

    #[test]
    fn test_ingest_populates_graph_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let (config, summary) = ingest_sample(dir.path());

        assert_eq!(summary.law_id, "закон_о_тишине");
        assert_eq!(summary.chapters, 1);
        assert_eq!(summary.articles, 3);
        assert!(summary.terms > 0);
        assert!(summary.key_terms.iter().any(|t| t.term == "тишин"));
        assert!(config.ontology.graph_path.exists());
        assert_eq!(summary.graph_path, config.ontology.graph_path);

        // The persisted graph reopens with the same shape.
        let store = OntologyStore::open(&config.ontology).unwrap();
        let stats = store.stats();
        assert_eq!(stats.laws, 1);
        assert_eq!(stats.chapters, 1);
        assert_eq!(stats.articles, 3);
        assert_eq!(stats.terms, summary.terms);
    }

    #[test]
    fn test_articles_attached_to_last_chapter() {
        let dir = tempfile::tempdir().unwrap();
        let text = "Глава 1. Первая\nГлава 2. Вторая\nСтатья 1. Норма\nТекст нормы закона.";
        let config = test_config(dir.path());
        let path = write_law(dir.path(), "закон.txt", text);
        let mut pipeline = DocumentPipeline::new(&config).unwrap();
        pipeline.ingest(&path).unwrap();

        let store = pipeline.store();
        let v = store.vocab();
        let article = v.individual("закон_article_1");
        let containers = store
            .graph()
            .subjects(&v.contains_article, &Node::iri(article.as_str()));
        assert_eq!(containers, vec![v.individual("закон_chapter_2")]);
    }

    #[test]
    fn test_definition_zone_split() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _summary) = ingest_sample(dir.path());

        let store = OntologyStore::open(&config.ontology).unwrap();
        let v = store.vocab();
        let term = Node::iri(v.individual("term_тишин"));
        let a1 = v.individual("закон_о_тишине_article_1");
        let a2 = v.individual("закон_о_тишине_article_2");

        // Article 1 opens with the term, article 2 mentions it near the end.
        assert!(store.graph().objects(&a1, &v.defines_term).contains(&&term));
        assert!(store.graph().objects(&a2, &v.uses_term).contains(&&term));
        assert!(!store.graph().objects(&a2, &v.defines_term).contains(&&term));
    }

    #[test]
    fn test_references_resolved_document_wide() {
        let dir = tempfile::tempdir().unwrap();
        let (config, summary) = ingest_sample(dir.path());

        // One phrase targeting article 1, edges from all three articles.
        assert_eq!(summary.references.len(), 1);
        assert_eq!(summary.reference_edges, 3);

        let store = OntologyStore::open(&config.ontology).unwrap();
        let a3 = store.vocab().individual("закон_о_тишине_article_3");
        let referenced = store.get_referenced_articles(&a3).unwrap();
        assert_eq!(referenced.len(), 1);
        assert_eq!(referenced[0]["number"].as_deref(), Some("1"));
    }

    #[test]
    fn test_search_finds_ingested_terms() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _summary) = ingest_sample(dir.path());

        let store = OntologyStore::open(&config.ontology).unwrap();
        let rows = store.search_articles_by_term("тишин").unwrap();
        assert!(!rows.is_empty());
        assert!(rows
            .iter()
            .any(|row| row["article_number"].as_deref() == Some("1")));
    }

    #[test]
    fn test_minimal_two_article_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = write_law(
            dir.path(),
            "кодекс.txt",
            "Статья 1. Текст один. Статья 2. Текст два.",
        );
        let mut pipeline = DocumentPipeline::new(&config).unwrap();
        let summary = pipeline.ingest(&path).unwrap();

        assert_eq!(summary.law_id, "кодекс");
        assert_eq!(summary.articles, 2);

        let store = pipeline.store();
        let law = store.law_iri("кодекс");
        let first = store.get_article_by_number(&law, "1").unwrap().unwrap();
        assert_eq!(first["article_text"].as_deref(), Some("Текст один."));
        let second = store.get_article_by_number(&law, "2").unwrap().unwrap();
        assert_eq!(second["article_text"].as_deref(), Some("Текст два."));
    }

    #[test]
    fn test_law_id_derivation() {
        assert_eq!(
            derive_law_id(Path::new("закон о про-тишине.txt")),
            "закон_о_про_тишине"
        );
        assert_eq!(derive_law_id(Path::new("кодекс.xml")), "кодекс");
        assert_eq!(normalize_id(" а б-в "), "а_б_в");
    }

    #[test]
    fn test_unparseable_document_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut pipeline = DocumentPipeline::new(&config).unwrap();
        let err = pipeline.ingest(Path::new("нет_такого.docx")).unwrap_err();
        assert_eq!(err.category(), "parsing");
        // Nothing was persisted.
        assert!(!config.ontology.graph_path.exists());
    }
}
