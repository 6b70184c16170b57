//! # Legal Document Ontology Pipeline
//!
//! ## Overview
//! This library ingests Russian legal documents, recovers their structure,
//! analyzes their language and maintains an RDF-backed ontology of laws,
//! chapters, articles and terminology with file-based persistence.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `parser`: Structural parsing of XML/HTML/PDF/plain-text sources
//! - `analysis`: Tokenization, lemmatization, entity and reference extraction
//! - `ontology`: Triple graph, vocabulary, queries and RDF/XML persistence
//! - `page_index`: Resumable article-to-page mapping for paginated sources
//! - `pipeline`: Ingestion orchestration from source file to saved graph
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Legal documents (XML/HTML/PDF/TXT), search queries (text)
//! - **Output**: A persisted RDF/XML graph and ordered query results
//! - **Performance**: Single-threaded per ingestion, deterministic results
//!
//! ## Usage
//! ```rust,no_run
//! use law_ontology::{Config, DocumentPipeline};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let mut pipeline = DocumentPipeline::new(&config)?;
//!     let summary = pipeline.ingest(Path::new("кодекс.txt"))?;
//!     println!("Ingested {} articles", summary.articles);
//!     Ok(())
//! }
//! ```

// Core modules
pub mod analysis;
pub mod config;
pub mod errors;
pub mod ontology;
pub mod page_index;
pub mod parser;
pub mod pipeline;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{PipelineError, Result};
pub use ontology::{OntologyStore, StoreStats};
pub use pipeline::{DocumentPipeline, IngestionSummary};
