//! # Legal Knowledge Store
//!
//! ## Purpose
//! Triple-shaped knowledge store for Russian legal documents. Laws, chapters,
//! articles and terminology become typed resources connected by a fixed
//! property vocabulary; the whole graph persists as one RDF/XML file.
//!
//! ## Input/Output Specification
//! - **Input**: Structural records produced by the parser and analysis layers
//! - **Output**: Minted IRIs, query rows, search results, store statistics
//! - **Persistence**: Wholesale RDF/XML save/load with sanitize-and-retry
//!
//! ## Key Features
//! - Deterministic IRI minting under a configurable namespace
//! - Tiered article search: terminology labels, then full-text substring,
//!   then whitespace-tolerant regex
//! - Structured select queries with optional/union/filter steps
//! - Direct lookups: article by number, outgoing references, law listing
//!
//! ## Architecture
//! - `vocab`: class/property IRI minting and local-name encoding
//! - `graph`: insertion-ordered triple set with S/P/O indexes
//! - `query`: binding-set query engine over the triple graph
//! - `rdfxml`: RDF/XML writer and tolerant loader
//!
//! ## Usage
//! ```rust,ignore
//! let mut store = OntologyStore::open(&config.ontology)?;
//! let law = store.add_law("гк_рф", "Гражданский кодекс", None);
//! let article = store.add_article("гк_рф_article_1", "1", Some("..."), None, Some(&law), None);
//! store.save(None)?;
//! let rows = store.search_articles_by_term("договор")?;
//! ```

pub mod graph;
pub mod query;
pub mod rdfxml;
pub mod vocab;

use crate::config::OntologyConfig;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use graph::{Node, Triple, TripleGraph};
pub use query::{iri, literal, var, Filter, PatternTerm, QueryRow, SelectQuery, TriplePattern};
pub use vocab::{Vocabulary, LANG_RU, RDF_TYPE, XSD_DATE, XSD_INTEGER};

/// Entity counts for the `stats` surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub laws: usize,
    pub chapters: usize,
    pub articles: usize,
    pub terms: usize,
    pub triples: usize,
}

/// The knowledge store: a triple graph plus the vocabulary it is typed with.
pub struct OntologyStore {
    vocab: Vocabulary,
    graph: TripleGraph,
    graph_path: PathBuf,
    search_limit: usize,
}

impl OntologyStore {
    /// Open the store for the configured graph file. A missing file starts
    /// an empty graph; a damaged file goes through the sanitize-and-retry
    /// loader before failing.
    pub fn open(config: &OntologyConfig) -> Result<Self> {
        let vocab = Vocabulary::new(&config.namespace);
        let graph_path = config.graph_path.clone();
        let graph = if graph_path.exists() {
            let graph = rdfxml::load_graph(&graph_path)?;
            tracing::info!(
                "Loaded ontology graph with {} triples from {}",
                graph.len(),
                graph_path.display()
            );
            graph
        } else {
            tracing::info!(
                "No ontology graph at {}, starting empty",
                graph_path.display()
            );
            TripleGraph::new()
        };
        Ok(Self {
            vocab,
            graph,
            graph_path,
            search_limit: config.search_result_limit,
        })
    }

    /// Write the graph to `path`, or to the configured location when `None`.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let target = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.graph_path.clone());
        rdfxml::save_graph(&self.graph, self.vocab.namespace(), &target)?;
        tracing::info!(
            "Saved ontology graph with {} triples to {}",
            self.graph.len(),
            target.display()
        );
        Ok(target)
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Read-only view of the underlying graph.
    pub fn graph(&self) -> &TripleGraph {
        &self.graph
    }

    /// The IRI a law identifier mints to.
    pub fn law_iri(&self, law_id: &str) -> String {
        self.vocab.individual(law_id)
    }

    /// Register a law. `date` is expected in `YYYY-MM-DD` form.
    pub fn add_law(&mut self, law_id: &str, title: &str, date: Option<&str>) -> String {
        let law = self.vocab.individual(law_id);
        self.graph.insert(Triple::new(
            &law,
            RDF_TYPE,
            Node::iri(self.vocab.law.as_str()),
        ));
        self.graph.insert(Triple::new(
            &law,
            &self.vocab.has_title,
            Node::lang_literal(title, LANG_RU),
        ));
        if let Some(date) = date {
            self.graph.insert(Triple::new(
                &law,
                &self.vocab.has_date,
                Node::typed_literal(date, XSD_DATE),
            ));
        }
        law
    }

    /// Register a chapter, optionally attaching it to its law.
    pub fn add_chapter(
        &mut self,
        chapter_id: &str,
        number: &str,
        title: &str,
        law_iri: Option<&str>,
    ) -> String {
        let chapter = self.vocab.individual(chapter_id);
        self.graph.insert(Triple::new(
            &chapter,
            RDF_TYPE,
            Node::iri(self.vocab.chapter.as_str()),
        ));
        self.graph.insert(Triple::new(
            &chapter,
            &self.vocab.has_number,
            Node::literal(number),
        ));
        self.graph.insert(Triple::new(
            &chapter,
            &self.vocab.has_title,
            Node::lang_literal(title, LANG_RU),
        ));
        if let Some(law) = law_iri {
            self.graph.insert(Triple::new(
                law,
                &self.vocab.contains_chapter,
                Node::iri(chapter.as_str()),
            ));
        }
        chapter
    }

    /// Register an article with its optional body text, page number, and
    /// containing law/chapter links.
    pub fn add_article(
        &mut self,
        article_id: &str,
        number: &str,
        text: Option<&str>,
        page: Option<u32>,
        law_iri: Option<&str>,
        chapter_iri: Option<&str>,
    ) -> String {
        let article = self.vocab.individual(article_id);
        self.graph.insert(Triple::new(
            &article,
            RDF_TYPE,
            Node::iri(self.vocab.article.as_str()),
        ));
        self.graph.insert(Triple::new(
            &article,
            &self.vocab.has_number,
            Node::literal(number),
        ));
        if let Some(text) = text {
            self.graph.insert(Triple::new(
                &article,
                &self.vocab.has_text,
                Node::lang_literal(text, LANG_RU),
            ));
        }
        if let Some(page) = page {
            self.graph.insert(Triple::new(
                &article,
                &self.vocab.has_page,
                Node::typed_literal(page.to_string(), XSD_INTEGER),
            ));
        }
        if let Some(chapter) = chapter_iri {
            self.graph.insert(Triple::new(
                chapter,
                &self.vocab.contains_article,
                Node::iri(article.as_str()),
            ));
        }
        if let Some(law) = law_iri {
            self.graph.insert(Triple::new(
                &article,
                &self.vocab.belongs_to_law,
                Node::iri(law),
            ));
        }
        article
    }

    /// Register a terminology entry.
    pub fn add_term(&mut self, term_id: &str, label: &str) -> String {
        let term = self.vocab.individual(term_id);
        self.graph.insert(Triple::new(
            &term,
            RDF_TYPE,
            Node::iri(self.vocab.term.as_str()),
        ));
        self.graph.insert(Triple::new(
            &term,
            &self.vocab.has_title,
            Node::lang_literal(label, LANG_RU),
        ));
        term
    }

    /// Record that two terms name the same concept.
    pub fn add_synonym(&mut self, term_iri: &str, synonym_iri: &str) {
        self.graph.insert(Triple::new(
            term_iri,
            &self.vocab.has_synonym,
            Node::iri(synonym_iri),
        ));
    }

    /// Link an article to a term it defines or merely uses.
    pub fn link_term_to_article(&mut self, term_iri: &str, article_iri: &str, is_definition: bool) {
        let predicate = if is_definition {
            &self.vocab.defines_term
        } else {
            &self.vocab.uses_term
        };
        self.graph.insert(Triple::new(
            article_iri,
            predicate,
            Node::iri(term_iri),
        ));
    }

    /// Record an outgoing reference from an article to another article
    /// and/or to a whole law.
    pub fn add_reference(
        &mut self,
        from_article_iri: &str,
        to_article_iri: Option<&str>,
        to_law_iri: Option<&str>,
    ) {
        if let Some(to_article) = to_article_iri {
            self.graph.insert(Triple::new(
                from_article_iri,
                &self.vocab.references,
                Node::iri(to_article),
            ));
        }
        if let Some(to_law) = to_law_iri {
            self.graph.insert(Triple::new(
                from_article_iri,
                &self.vocab.references_law,
                Node::iri(to_law),
            ));
        }
    }

    /// Run a structured query against the graph.
    pub fn query(&self, query: &SelectQuery) -> Result<Vec<QueryRow>> {
        tracing::trace!("Executing graph query: {}", query.render());
        query.execute(&self.graph)
    }

    /// Find articles for a search string, relaxing the match in stages.
    ///
    /// Later stages run only when the previous one produced nothing; results
    /// from different stages are never merged.
    pub fn search_articles_by_term(&self, term: &str) -> Result<Vec<QueryRow>> {
        let v = &self.vocab;
        let law_group = || {
            vec![
                TriplePattern::new(var("article"), iri(&v.belongs_to_law), var("law")),
                TriplePattern::new(var("law"), iri(&v.has_title), var("law_title")),
            ]
        };
        let projection = [
            "article",
            "article_number",
            "article_text",
            "law",
            "law_title",
        ];

        // 1. Terminology match: articles defining or using a term whose
        //    label contains the query.
        let by_label = SelectQuery::select(&projection)
            .pattern(var("term"), iri(RDF_TYPE), iri(&v.term))
            .pattern(var("term"), iri(&v.has_title), var("term_label"))
            .filter_contains_ci("term_label", term)
            .union(vec![
                vec![TriplePattern::new(
                    var("article"),
                    iri(&v.defines_term),
                    var("term"),
                )],
                vec![TriplePattern::new(
                    var("article"),
                    iri(&v.uses_term),
                    var("term"),
                )],
            ])
            .pattern(var("article"), iri(&v.has_number), var("article_number"))
            .optional(vec![TriplePattern::new(
                var("article"),
                iri(&v.has_text),
                var("article_text"),
            )])
            .optional(law_group());
        let rows = self.query(&by_label)?;
        if !rows.is_empty() {
            tracing::debug!("Term-label search matched {} articles", rows.len());
            return Ok(rows);
        }

        // 2. Full-text fallback: substring match over article bodies,
        //    capped to keep worst-case scans bounded.
        let by_text = SelectQuery::select(&projection)
            .pattern(var("article"), iri(RDF_TYPE), iri(&v.article))
            .pattern(var("article"), iri(&v.has_number), var("article_number"))
            .pattern(var("article"), iri(&v.has_text), var("article_text"))
            .filter_contains_ci("article_text", term)
            .optional(law_group())
            .limit(self.search_limit);
        let rows = self.query(&by_text)?;
        if !rows.is_empty() {
            tracing::debug!("Full-text search matched {} articles", rows.len());
            return Ok(rows);
        }

        // 3. Whitespace-tolerant pass for multi-word queries: words may be
        //    separated by any whitespace run, including line breaks.
        if term.split_whitespace().count() > 1 {
            let words: Vec<String> = term
                .split_whitespace()
                .map(regex::escape)
                .collect();
            let pattern = format!("(?i){}", words.join(r"\s+"));
            let by_regex = SelectQuery::select(&projection)
                .pattern(var("article"), iri(RDF_TYPE), iri(&v.article))
                .pattern(var("article"), iri(&v.has_number), var("article_number"))
                .pattern(var("article"), iri(&v.has_text), var("article_text"))
                .filter_regex("article_text", &pattern)
                .optional(law_group())
                .limit(self.search_limit);
            let rows = self.query(&by_regex)?;
            if !rows.is_empty() {
                tracing::debug!("Whitespace-tolerant search matched {} articles", rows.len());
                return Ok(rows);
            }
        }

        Ok(Vec::new())
    }

    /// The article of a law with the given number, when present.
    pub fn get_article_by_number(&self, law_iri: &str, number: &str) -> Result<Option<QueryRow>> {
        let v = &self.vocab;
        let query = SelectQuery::select(&["article", "article_text", "article_page"])
            .pattern(var("article"), iri(&v.belongs_to_law), iri(law_iri))
            .pattern(var("article"), iri(&v.has_number), literal(number))
            .optional(vec![TriplePattern::new(
                var("article"),
                iri(&v.has_text),
                var("article_text"),
            )])
            .optional(vec![TriplePattern::new(
                var("article"),
                iri(&v.has_page),
                var("article_page"),
            )])
            .limit(1);
        Ok(self.query(&query)?.into_iter().next())
    }

    /// Articles the given article references, with their numbers and text.
    pub fn get_referenced_articles(&self, article_iri: &str) -> Result<Vec<QueryRow>> {
        let v = &self.vocab;
        let query = SelectQuery::select(&["referenced", "number", "text"])
            .pattern(iri(article_iri), iri(&v.references), var("referenced"))
            .pattern(var("referenced"), iri(&v.has_number), var("number"))
            .optional(vec![TriplePattern::new(
                var("referenced"),
                iri(&v.has_text),
                var("text"),
            )]);
        self.query(&query)
    }

    /// All registered laws with their titles.
    pub fn laws(&self) -> Result<Vec<QueryRow>> {
        let v = &self.vocab;
        let query = SelectQuery::select(&["law", "title"])
            .pattern(var("law"), iri(RDF_TYPE), iri(&v.law))
            .pattern(var("law"), iri(&v.has_title), var("title"));
        self.query(&query)
    }

    pub fn stats(&self) -> StoreStats {
        let count = |class: &str| {
            self.graph
                .matching(None, Some(RDF_TYPE), Some(&Node::iri(class)))
                .len()
        };
        StoreStats {
            laws: count(&self.vocab.law),
            chapters: count(&self.vocab.chapter),
            articles: count(&self.vocab.article),
            terms: count(&self.vocab.term),
            triples: self.graph.len(),
        }
    }
}
