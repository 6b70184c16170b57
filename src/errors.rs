//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the legal-document pipeline, covering parsing,
//! linguistic analysis, graph persistence, query execution and configuration.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from pipeline components
//! - **Output**: Structured error types with context fields
//! - **Error Categories**: Parsing, Graph, Query, Page Index, Configuration
//!
//! ## Key Features
//! - One crate-wide error enum with contextual struct variants
//! - Automatic conversion from I/O and JSON errors
//! - Category labels for logging and reporting
//! - Recoverability hints for retry-style callers
//!
//! ## Usage
//! ```rust
//! use law_ontology::errors::{PipelineError, Result};
//!
//! fn parse_step() -> Result<()> {
//!     Err(PipelineError::UnsupportedFormat { extension: "docx".to_string() })
//! }
//!
//! assert_eq!(parse_step().unwrap_err().category(), "parsing");
//! ```

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for the legal-document pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document format not in the supported set
    #[error("Unsupported document format: '{extension}'")]
    UnsupportedFormat { extension: String },

    /// Optional capability (feature-gated parser, analyzer backend) missing at call time
    #[error("Capability '{capability}' is unavailable: {details}")]
    DependencyUnavailable { capability: String, details: String },

    /// Structural parsing failed for a document
    #[error("Failed to parse document '{file}': {details}")]
    DocumentParsing { file: String, details: String },

    /// Persisted graph file failed to parse; a sanitize-and-retry may still succeed
    #[error("Malformed persisted graph at '{path}': {details}")]
    MalformedGraph { path: String, details: String },

    /// Persisted graph unreadable even after sanitization
    #[error("Cannot load persisted graph at '{path}': {details}")]
    GraphLoad { path: String, details: String },

    /// Graph serialization to disk failed
    #[error("Cannot save graph to '{path}': {details}")]
    GraphSave { path: String, details: String },

    /// Pattern query could not be executed
    #[error("Query execution failed for pattern `{pattern}`: {details}")]
    QueryExecution { pattern: String, details: String },

    /// Page text could not be produced during a page-index scan
    #[error("Page scan failed for '{file}': {details}")]
    PageScan { file: String, details: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    /// Check if the error is recoverable (caller may retry after corrective action)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedGraph { .. } | PipelineError::PageScan { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Config { .. } => "configuration",
            PipelineError::UnsupportedFormat { .. }
            | PipelineError::DependencyUnavailable { .. }
            | PipelineError::DocumentParsing { .. } => "parsing",
            PipelineError::MalformedGraph { .. }
            | PipelineError::GraphLoad { .. }
            | PipelineError::GraphSave { .. } => "graph",
            PipelineError::QueryExecution { .. } => "query",
            PipelineError::PageScan { .. } => "page_index",
            PipelineError::Io(_) => "io",
            PipelineError::Json(_) | PipelineError::Internal { .. } => "generic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = PipelineError::UnsupportedFormat {
            extension: "docx".to_string(),
        };
        assert_eq!(err.category(), "parsing");
        assert!(!err.is_recoverable());

        let err = PipelineError::MalformedGraph {
            path: "graph.rdf".to_string(),
            details: "unexpected eof".to_string(),
        };
        assert_eq!(err.category(), "graph");
        assert!(err.is_recoverable());

        let err = PipelineError::PageScan {
            file: "кодекс.pdf".to_string(),
            details: "page 4 unreadable".to_string(),
        };
        assert_eq!(err.category(), "page_index");
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Page scan failed for 'кодекс.pdf': page 4 unreadable"
        );
    }

    #[test]
    fn test_io_conversion() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/not/here")?)
        }
        assert_eq!(read_missing().unwrap_err().category(), "io");
    }
}
