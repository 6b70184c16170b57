//! # Ontology Vocabulary
//!
//! ## Purpose
//! Mints the IRIs used throughout the legal knowledge graph: the four entity
//! classes (law, chapter, article, term), the property set connecting them,
//! and individual IRIs derived from untrusted identifier fragments.
//!
//! ## Input/Output Specification
//! - **Input**: Configured namespace IRI, raw identifier fragments
//! - **Output**: Absolute IRIs as plain strings
//!
//! ## Key Features
//! - Single place where every class/property name is spelled
//! - Percent-encoding of identifier fragments so minted IRIs survive
//!   round-trips through RDF/XML attributes

/// RDF syntax namespace.
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
/// The `rdf:type` predicate.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
/// XML Schema `date` datatype.
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
/// XML Schema `integer` datatype.
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
/// Language tag attached to Russian text literals.
pub const LANG_RU: &str = "ru";

/// Class and property IRIs minted under a configurable namespace.
///
/// The vocabulary is built once per store so every triple spells its
/// predicates identically regardless of the configured namespace.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    namespace: String,
    // Classes
    pub law: String,
    pub chapter: String,
    pub article: String,
    pub term: String,
    // Datatype properties
    pub has_title: String,
    pub has_number: String,
    pub has_text: String,
    pub has_date: String,
    pub has_page: String,
    // Object properties
    pub contains_chapter: String,
    pub contains_article: String,
    pub belongs_to_law: String,
    pub references: String,
    pub references_law: String,
    pub defines_term: String,
    pub uses_term: String,
    pub has_synonym: String,
}

impl Vocabulary {
    /// Build the vocabulary under `namespace`. The namespace is expected to
    /// end in `#` or `/` (validated at configuration load).
    pub fn new(namespace: &str) -> Self {
        let mint = |local: &str| format!("{namespace}{local}");
        Self {
            namespace: namespace.to_string(),
            law: mint("Law"),
            chapter: mint("Chapter"),
            article: mint("Article"),
            term: mint("Term"),
            has_title: mint("hasTitle"),
            has_number: mint("hasNumber"),
            has_text: mint("hasText"),
            has_date: mint("hasDate"),
            has_page: mint("hasPage"),
            contains_chapter: mint("containsChapter"),
            contains_article: mint("containsArticle"),
            belongs_to_law: mint("belongsToLaw"),
            references: mint("references"),
            references_law: mint("referencesLaw"),
            defines_term: mint("definesTerm"),
            uses_term: mint("usesTerm"),
            has_synonym: mint("hasSynonym"),
        }
    }

    /// The namespace this vocabulary mints under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Mint an individual IRI from an untrusted identifier fragment.
    pub fn individual(&self, id: &str) -> String {
        format!("{}{}", self.namespace, encode_local_name(id))
    }

    /// The local part of `iri` when it lives in this namespace.
    pub fn local_part<'a>(&self, iri: &'a str) -> Option<&'a str> {
        iri.strip_prefix(self.namespace.as_str())
    }
}

/// Percent-encode an identifier fragment into a safe IRI local name.
///
/// Unicode letters and digits pass through (Cyrillic identifiers stay
/// readable), as do `_`, `-` and `.`. Everything else is encoded byte-wise.
pub fn encode_local_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.') {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}
