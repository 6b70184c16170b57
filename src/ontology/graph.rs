//! # Triple Graph
//!
//! ## Purpose
//! In-memory RDF-shaped triple store backing the legal ontology. Subjects and
//! predicates are IRIs; objects are IRIs or literals with optional language
//! tag / datatype. The graph behaves as a set (re-inserting an existing
//! triple is a no-op) while preserving insertion order, which keeps query
//! results deterministic across runs.
//!
//! ## Input/Output Specification
//! - **Input**: `Triple` values built by the store layer
//! - **Output**: Ordered triple iteration and indexed `matching` lookups
//!
//! ## Key Features
//! - Subject / predicate / object secondary indexes for pattern lookups
//! - Insertion-ordered iteration (first-added, first-served)
//! - Set semantics over full triples

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// An RDF node in object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// A named resource.
    Iri(String),
    /// A literal value, optionally tagged with a language or a datatype IRI.
    Literal {
        value: String,
        lang: Option<String>,
        datatype: Option<String>,
    },
}

impl Node {
    pub fn iri(value: impl Into<String>) -> Self {
        Node::Iri(value.into())
    }

    /// A plain literal without language tag or datatype.
    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal {
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    /// A language-tagged literal.
    pub fn lang_literal(value: impl Into<String>, lang: &str) -> Self {
        Node::Literal {
            value: value.into(),
            lang: Some(lang.to_string()),
            datatype: None,
        }
    }

    /// A literal with an explicit datatype IRI.
    pub fn typed_literal(value: impl Into<String>, datatype: &str) -> Self {
        Node::Literal {
            value: value.into(),
            lang: None,
            datatype: Some(datatype.to_string()),
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Node::Iri(iri) => Some(iri),
            Node::Literal { .. } => None,
        }
    }

    /// Display string used in query rows: the IRI text or the literal's
    /// lexical value, without tag or datatype decoration.
    pub fn lexical_value(&self) -> &str {
        match self {
            Node::Iri(iri) => iri,
            Node::Literal { value, .. } => value,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Iri(iri) => write!(f, "<{iri}>"),
            Node::Literal {
                value,
                lang: Some(lang),
                ..
            } => write!(f, "{value:?}@{lang}"),
            Node::Literal {
                value,
                datatype: Some(datatype),
                ..
            } => write!(f, "{value:?}^^<{datatype}>"),
            Node::Literal { value, .. } => write!(f, "{value:?}"),
        }
    }
}

/// A single subject-predicate-object statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Node,
}

impl Triple {
    pub fn new(subject: &str, predicate: &str, object: Node) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
        }
    }
}

/// Insertion-ordered triple set with subject / predicate / object indexes.
#[derive(Debug, Default)]
pub struct TripleGraph {
    triples: IndexSet<Triple>,
    by_subject: HashMap<String, Vec<usize>>,
    by_predicate: HashMap<String, Vec<usize>>,
    by_object: HashMap<Node, Vec<usize>>,
}

impl TripleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Insert a triple, returning `false` when it was already present.
    ///
    /// Triples are never removed, so positions handed to the indexes stay
    /// valid for the lifetime of the graph.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if self.triples.contains(&triple) {
            return false;
        }
        let position = self.triples.len();
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .push(position);
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .push(position);
        self.by_object
            .entry(triple.object.clone())
            .or_default()
            .push(position);
        self.triples.insert(triple);
        true
    }

    /// All triples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Triples matching the bound positions, in insertion order.
    ///
    /// The narrowest available index (subject, then object, then predicate)
    /// drives the scan; unbound positions match anything.
    pub fn matching(
        &self,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&Node>,
    ) -> Vec<&Triple> {
        let candidates: Vec<usize> = if let Some(subject) = subject {
            self.by_subject.get(subject).cloned().unwrap_or_default()
        } else if let Some(object) = object {
            self.by_object.get(object).cloned().unwrap_or_default()
        } else if let Some(predicate) = predicate {
            self.by_predicate.get(predicate).cloned().unwrap_or_default()
        } else {
            (0..self.triples.len()).collect()
        };

        candidates
            .into_iter()
            .filter_map(|position| self.triples.get_index(position))
            .filter(|triple| {
                subject.map_or(true, |s| triple.subject == s)
                    && predicate.map_or(true, |p| triple.predicate == p)
                    && object.map_or(true, |o| &triple.object == o)
            })
            .collect()
    }

    /// Objects of all `(subject, predicate, _)` triples, in insertion order.
    pub fn objects(&self, subject: &str, predicate: &str) -> Vec<&Node> {
        self.matching(Some(subject), Some(predicate), None)
            .into_iter()
            .map(|triple| &triple.object)
            .collect()
    }

    /// Subjects of all `(_, predicate, object)` triples, in insertion order.
    pub fn subjects(&self, predicate: &str, object: &Node) -> Vec<&str> {
        self.matching(None, Some(predicate), Some(object))
            .into_iter()
            .map(|triple| triple.subject.as_str())
            .collect()
    }
}
