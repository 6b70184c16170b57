//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the legal-document pipeline: analysis safety
//! thresholds, ontology namespace and storage location, and logging behavior,
//! with validation and type-safe access.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Range checks and namespace shape checks with detailed messages
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (`LAW_ONTOLOGY_*`)
//! 2. Configuration file
//! 3. Default values
//!
//! ## Usage
//! ```rust
//! use law_ontology::config::Config;
//!
//! let config = Config::default();
//! assert!(config.analysis.pipeline_safe_max_chars > 0);
//! assert!(config.ontology.namespace.ends_with('#'));
//! ```

use crate::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Linguistic analysis settings
    pub analysis: AnalysisConfig,
    /// Ontology storage and namespace settings
    pub ontology: OntologyConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Linguistic analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum character count fed to the heavier analysis backend in one call.
    /// Longer texts fall back to the lightweight regex path or are sampled.
    pub pipeline_safe_max_chars: usize,
    /// Maximum character count for bulk key-term counting; longer texts are
    /// truncated before counting.
    pub bulk_max_chars: usize,
    /// Enable per-token morphological normalization
    pub enable_morphology: bool,
    /// Enable candidate-term (title-case noun) extraction
    pub enable_term_extraction: bool,
    /// Number of key terms the ingestion pipeline records per document
    pub key_terms_top_n: usize,
}

/// Ontology storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyConfig {
    /// Base IRI under which all entities are minted; must end with '#' or '/'
    pub namespace: String,
    /// Persisted graph file (RDF/XML)
    pub graph_path: PathBuf,
    /// Row cap applied to full-text search fallbacks
    pub search_result_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (optional, logs to stdout if not specified)
    pub file_path: Option<PathBuf>,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| PipelineError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(namespace) = std::env::var("LAW_ONTOLOGY_NAMESPACE") {
            self.ontology.namespace = namespace;
        }
        if let Ok(graph_path) = std::env::var("LAW_ONTOLOGY_GRAPH_PATH") {
            self.ontology.graph_path = PathBuf::from(graph_path);
        }
        if let Ok(level) = std::env::var("LAW_ONTOLOGY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(top_n) = std::env::var("LAW_ONTOLOGY_KEY_TERMS_TOP_N") {
            self.analysis.key_terms_top_n =
                top_n.parse().map_err(|_| PipelineError::Config {
                    message: "Invalid number in LAW_ONTOLOGY_KEY_TERMS_TOP_N".to_string(),
                })?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ontology.namespace.is_empty()
            || !(self.ontology.namespace.ends_with('#') || self.ontology.namespace.ends_with('/'))
        {
            return Err(PipelineError::Config {
                message: "ontology.namespace must be a non-empty IRI ending with '#' or '/'"
                    .to_string(),
            });
        }

        if self.analysis.pipeline_safe_max_chars == 0 {
            return Err(PipelineError::Config {
                message: "analysis.pipeline_safe_max_chars must be greater than zero".to_string(),
            });
        }

        if self.analysis.bulk_max_chars < self.analysis.pipeline_safe_max_chars {
            return Err(PipelineError::Config {
                message: "analysis.bulk_max_chars cannot be smaller than pipeline_safe_max_chars"
                    .to_string(),
            });
        }

        if self.analysis.key_terms_top_n == 0 {
            return Err(PipelineError::Config {
                message: "analysis.key_terms_top_n must be greater than zero".to_string(),
            });
        }

        if self.ontology.search_result_limit == 0 {
            return Err(PipelineError::Config {
                message: "ontology.search_result_limit must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig {
                pipeline_safe_max_chars: 400_000,
                bulk_max_chars: 1_500_000,
                enable_morphology: true,
                enable_term_extraction: true,
                key_terms_top_n: 20,
            },
            ontology: OntologyConfig {
                namespace: "http://law.ontology.ru/#".to_string(),
                graph_path: PathBuf::from("./data/ontology/law_ontology.rdf"),
                search_result_limit: 50,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                json_format: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.pipeline_safe_max_chars, 400_000);
        assert_eq!(config.analysis.bulk_max_chars, 1_500_000);
        assert_eq!(config.analysis.key_terms_top_n, 20);
        assert_eq!(config.ontology.search_result_limit, 50);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let toml_text = config.to_toml().unwrap();
        let reloaded: Config = toml::from_str(&toml_text).unwrap();
        assert_eq!(reloaded.ontology.namespace, config.ontology.namespace);
        assert_eq!(
            reloaded.analysis.bulk_max_chars,
            config.analysis.bulk_max_chars
        );
    }

    #[test]
    fn test_rejects_bad_namespace() {
        let mut config = Config::default();
        config.ontology.namespace = "http://law.ontology.ru".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.analysis.bulk_max_chars = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override_applies() {
        std::env::set_var("LAW_ONTOLOGY_KEY_TERMS_TOP_N", "7");
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(dir.path().join("nope.toml")).unwrap();
        std::env::remove_var("LAW_ONTOLOGY_KEY_TERMS_TOP_N");
        assert_eq!(config.analysis.key_terms_top_n, 7);
    }
}
