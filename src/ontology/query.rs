//! # Graph Query Engine
//!
//! ## Purpose
//! Structured select queries over the triple graph: ordered triple patterns
//! joined through shared variables, optional pattern groups, union branches,
//! and variable filters, with an optional row limit.
//!
//! ## Input/Output Specification
//! - **Input**: A `SelectQuery` built through the fluent constructors
//! - **Output**: Ordered rows keyed by the declared variables; a variable
//!   left unbound by the matched data maps to `None`
//!
//! ## Key Features
//! - Binding-set evaluation: each step refines the set of candidate rows
//! - `Optional` groups extend bindings without discarding non-matches
//! - `Union` keeps a binding once per matching branch
//! - Case-insensitive substring and regex filters over bound values
//!
//! ## Usage
//! ```rust,ignore
//! let query = SelectQuery::select(&["article", "number"])
//!     .pattern(var("article"), iri(RDF_TYPE), iri(&vocab.article))
//!     .pattern(var("article"), iri(&vocab.has_number), var("number"))
//!     .limit(10);
//! let rows = query.execute(&graph)?;
//! ```

use crate::errors::{PipelineError, Result};
use crate::ontology::graph::{Node, TripleGraph};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;

/// One result row: every declared variable, in declaration order, mapped to
/// its display value or `None` when the variable stayed unbound.
pub type QueryRow = IndexMap<String, Option<String>>;

/// A variable-to-node assignment accumulated while matching.
type Binding = HashMap<String, Node>;

/// One position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    /// Named variable, bound during execution.
    Var(String),
    /// Ground IRI that must match exactly.
    Iri(String),
    /// Ground literal matched on its lexical value, ignoring language tag
    /// and datatype.
    Literal(String),
}

/// Shorthand for [`PatternTerm::Var`].
pub fn var(name: &str) -> PatternTerm {
    PatternTerm::Var(name.to_string())
}

/// Shorthand for [`PatternTerm::Iri`].
pub fn iri(value: impl AsRef<str>) -> PatternTerm {
    PatternTerm::Iri(value.as_ref().to_string())
}

/// Shorthand for [`PatternTerm::Literal`].
pub fn literal(value: impl AsRef<str>) -> PatternTerm {
    PatternTerm::Literal(value.as_ref().to_string())
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTerm::Var(name) => write!(f, "?{name}"),
            PatternTerm::Iri(iri) => write!(f, "<{iri}>"),
            PatternTerm::Literal(value) => write!(f, "{value:?}"),
        }
    }
}

/// A subject-predicate-object pattern.
#[derive(Debug, Clone)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Row-level predicates applied to bound variables.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Case-insensitive substring test on the variable's display value.
    /// Bindings where the variable is unbound are dropped.
    ContainsCi { var: String, needle: String },
    /// Regular-expression test on the variable's display value.
    Regex { var: String, pattern: String },
}

/// One evaluation step of a select query.
#[derive(Debug, Clone)]
pub enum QueryStep {
    /// Mandatory pattern: bindings that cannot match are dropped.
    Pattern(TriplePattern),
    /// Pattern group that extends a binding when it matches and leaves the
    /// binding untouched otherwise.
    Optional(Vec<TriplePattern>),
    /// Alternative pattern groups. A binding survives once per matching
    /// branch and is dropped when no branch matches.
    Union(Vec<Vec<TriplePattern>>),
    /// Filter over the current binding set.
    Filter(Filter),
}

/// A select query: declared output variables, ordered steps, optional limit.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    variables: Vec<String>,
    steps: Vec<QueryStep>,
    limit: Option<usize>,
}

impl SelectQuery {
    /// Start a query projecting the given variables, in order.
    pub fn select(variables: &[&str]) -> Self {
        Self {
            variables: variables.iter().map(|v| v.to_string()).collect(),
            steps: Vec::new(),
            limit: None,
        }
    }

    pub fn pattern(mut self, subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        self.steps
            .push(QueryStep::Pattern(TriplePattern::new(subject, predicate, object)));
        self
    }

    pub fn optional(mut self, group: Vec<TriplePattern>) -> Self {
        self.steps.push(QueryStep::Optional(group));
        self
    }

    pub fn union(mut self, branches: Vec<Vec<TriplePattern>>) -> Self {
        self.steps.push(QueryStep::Union(branches));
        self
    }

    pub fn filter_contains_ci(mut self, var: &str, needle: &str) -> Self {
        self.steps.push(QueryStep::Filter(Filter::ContainsCi {
            var: var.to_string(),
            needle: needle.to_string(),
        }));
        self
    }

    pub fn filter_regex(mut self, var: &str, pattern: &str) -> Self {
        self.steps.push(QueryStep::Filter(Filter::Regex {
            var: var.to_string(),
            pattern: pattern.to_string(),
        }));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the query against `graph`.
    pub fn execute(&self, graph: &TripleGraph) -> Result<Vec<QueryRow>> {
        let mut bindings: Vec<Binding> = vec![Binding::new()];
        for step in &self.steps {
            bindings = self.apply_step(graph, step, bindings)?;
            if bindings.is_empty() {
                break;
            }
        }
        if let Some(limit) = self.limit {
            bindings.truncate(limit);
        }
        Ok(bindings.iter().map(|binding| self.project(binding)).collect())
    }

    /// Render the query in a SPARQL-like notation for logs and errors.
    pub fn render(&self) -> String {
        let mut out = String::from("SELECT");
        for variable in &self.variables {
            let _ = write!(out, " ?{variable}");
        }
        out.push_str(" WHERE {");
        for step in &self.steps {
            match step {
                QueryStep::Pattern(pattern) => {
                    let _ = write!(out, " {pattern} .");
                }
                QueryStep::Optional(group) => {
                    out.push_str(" OPTIONAL {");
                    for pattern in group {
                        let _ = write!(out, " {pattern} .");
                    }
                    out.push_str(" }");
                }
                QueryStep::Union(branches) => {
                    let rendered: Vec<String> = branches
                        .iter()
                        .map(|branch| {
                            let inner: Vec<String> =
                                branch.iter().map(|p| format!("{p} .")).collect();
                            format!("{{ {} }}", inner.join(" "))
                        })
                        .collect();
                    let _ = write!(out, " {}", rendered.join(" UNION "));
                }
                QueryStep::Filter(Filter::ContainsCi { var, needle }) => {
                    let _ = write!(out, " FILTER CONTAINS(LCASE(?{var}), {needle:?})");
                }
                QueryStep::Filter(Filter::Regex { var, pattern }) => {
                    let _ = write!(out, " FILTER REGEX(?{var}, {pattern:?})");
                }
            }
        }
        out.push_str(" }");
        if let Some(limit) = self.limit {
            let _ = write!(out, " LIMIT {limit}");
        }
        out
    }

    fn apply_step(
        &self,
        graph: &TripleGraph,
        step: &QueryStep,
        bindings: Vec<Binding>,
    ) -> Result<Vec<Binding>> {
        match step {
            QueryStep::Pattern(pattern) => {
                let mut next = Vec::new();
                for binding in &bindings {
                    next.extend(solve_pattern(graph, pattern, binding));
                }
                Ok(next)
            }
            QueryStep::Optional(group) => {
                let mut next = Vec::new();
                for binding in bindings {
                    let extended = solve_group(graph, group, &binding);
                    if extended.is_empty() {
                        next.push(binding);
                    } else {
                        next.extend(extended);
                    }
                }
                Ok(next)
            }
            QueryStep::Union(branches) => {
                let mut next = Vec::new();
                for binding in &bindings {
                    for branch in branches {
                        next.extend(solve_group(graph, branch, binding));
                    }
                }
                Ok(next)
            }
            QueryStep::Filter(filter) => self.apply_filter(filter, bindings),
        }
    }

    fn apply_filter(&self, filter: &Filter, bindings: Vec<Binding>) -> Result<Vec<Binding>> {
        match filter {
            Filter::ContainsCi { var, needle } => {
                let needle = needle.to_lowercase();
                Ok(bindings
                    .into_iter()
                    .filter(|binding| {
                        binding.get(var).map_or(false, |node| {
                            node.lexical_value().to_lowercase().contains(&needle)
                        })
                    })
                    .collect())
            }
            Filter::Regex { var, pattern } => {
                let regex = Regex::new(pattern).map_err(|e| PipelineError::QueryExecution {
                    pattern: self.render(),
                    details: format!("invalid filter regex: {e}"),
                })?;
                Ok(bindings
                    .into_iter()
                    .filter(|binding| {
                        binding
                            .get(var)
                            .map_or(false, |node| regex.is_match(node.lexical_value()))
                    })
                    .collect())
            }
        }
    }

    fn project(&self, binding: &Binding) -> QueryRow {
        self.variables
            .iter()
            .map(|name| {
                let value = binding
                    .get(name)
                    .map(|node| node.lexical_value().to_string());
                (name.clone(), value)
            })
            .collect()
    }
}

/// All conjunctive solutions of `patterns` starting from `seed`.
fn solve_group(graph: &TripleGraph, patterns: &[TriplePattern], seed: &Binding) -> Vec<Binding> {
    let mut current = vec![seed.clone()];
    for pattern in patterns {
        let mut next = Vec::new();
        for binding in &current {
            next.extend(solve_pattern(graph, pattern, binding));
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Extend `binding` over every triple matching `pattern`.
fn solve_pattern(graph: &TripleGraph, pattern: &TriplePattern, binding: &Binding) -> Vec<Binding> {
    let subject_hint = iri_hint(&pattern.subject, binding);
    let predicate_hint = iri_hint(&pattern.predicate, binding);
    // The object index needs an exact node; ground literals match on lexical
    // value only and therefore fall back to scanning.
    let object_hint: Option<Node> = match &pattern.object {
        PatternTerm::Iri(value) => Some(Node::iri(value.as_str())),
        PatternTerm::Var(name) => binding.get(name).cloned(),
        PatternTerm::Literal(_) => None,
    };

    let mut solutions = Vec::new();
    for triple in graph.matching(
        subject_hint.as_deref(),
        predicate_hint.as_deref(),
        object_hint.as_ref(),
    ) {
        let mut candidate = binding.clone();
        if bind_iri(&mut candidate, &pattern.subject, &triple.subject)
            && bind_iri(&mut candidate, &pattern.predicate, &triple.predicate)
            && bind_node(&mut candidate, &pattern.object, &triple.object)
        {
            solutions.push(candidate);
        }
    }
    solutions
}

/// The IRI a subject/predicate position is pinned to, if any.
fn iri_hint(term: &PatternTerm, binding: &Binding) -> Option<String> {
    match term {
        PatternTerm::Iri(value) => Some(value.clone()),
        PatternTerm::Var(name) => binding
            .get(name)
            .and_then(Node::as_iri)
            .map(str::to_string),
        PatternTerm::Literal(_) => None,
    }
}

/// Match an IRI position against a pattern term, binding variables on first
/// use and enforcing agreement on reuse.
fn bind_iri(binding: &mut Binding, term: &PatternTerm, value: &str) -> bool {
    match term {
        PatternTerm::Var(name) => match binding.get(name) {
            Some(Node::Iri(existing)) => existing == value,
            Some(_) => false,
            None => {
                binding.insert(name.clone(), Node::iri(value));
                true
            }
        },
        PatternTerm::Iri(expected) => expected == value,
        PatternTerm::Literal(_) => false,
    }
}

/// Match the object position against a pattern term.
fn bind_node(binding: &mut Binding, term: &PatternTerm, value: &Node) -> bool {
    match term {
        PatternTerm::Var(name) => match binding.get(name) {
            Some(existing) => existing == value,
            None => {
                binding.insert(name.clone(), value.clone());
                true
            }
        },
        PatternTerm::Iri(expected) => matches!(value, Node::Iri(v) if v == expected),
        PatternTerm::Literal(expected) => {
            matches!(value, Node::Literal { value: v, .. } if v == expected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::graph::Triple;
    use crate::ontology::vocab::RDF_TYPE;

    const NS: &str = "http://law.test/#";

    fn p(local: &str) -> String {
        format!("{NS}{local}")
    }

    fn fixture() -> TripleGraph {
        let mut graph = TripleGraph::new();
        for (id, number) in [("a1", "1"), ("a2", "2"), ("a3", "3")] {
            let subject = p(id);
            graph.insert(Triple::new(&subject, RDF_TYPE, Node::iri(p("Article"))));
            graph.insert(Triple::new(
                &subject,
                &p("hasNumber"),
                Node::literal(number),
            ));
        }
        graph.insert(Triple::new(
            &p("a1"),
            &p("hasText"),
            Node::lang_literal("Определение Договора аренды", "ru"),
        ));
        graph.insert(Triple::new(
            &p("a2"),
            &p("hasText"),
            Node::lang_literal("Прочие положения", "ru"),
        ));
        // a3 has no text on purpose.
        graph.insert(Triple::new(
            &p("a1"),
            &p("definesTerm"),
            Node::iri(p("term_договор")),
        ));
        graph.insert(Triple::new(
            &p("a2"),
            &p("usesTerm"),
            Node::iri(p("term_договор")),
        ));
        graph
    }

    #[test]
    fn test_single_pattern_preserves_insertion_order() {
        let graph = fixture();
        let rows = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(RDF_TYPE), iri(p("Article")))
            .execute(&graph)
            .unwrap();
        let ids: Vec<_> = rows
            .iter()
            .map(|row| row["article"].clone().unwrap())
            .collect();
        assert_eq!(ids, vec![p("a1"), p("a2"), p("a3")]);
    }

    #[test]
    fn test_join_on_shared_variable() {
        let graph = fixture();
        let rows = SelectQuery::select(&["number"])
            .pattern(var("article"), iri(p("hasText")), var("text"))
            .pattern(var("article"), iri(p("hasNumber")), var("number"))
            .filter_contains_ci("text", "договор")
            .execute(&graph)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["number"].as_deref(), Some("1"));
    }

    #[test]
    fn test_optional_leaves_unbound_as_none() {
        let graph = fixture();
        let rows = SelectQuery::select(&["article", "text"])
            .pattern(var("article"), iri(RDF_TYPE), iri(p("Article")))
            .optional(vec![TriplePattern::new(
                var("article"),
                iri(p("hasText")),
                var("text"),
            )])
            .execute(&graph)
            .unwrap();
        assert_eq!(rows.len(), 3);
        let a3_iri = p("a3");
        let a3 = rows
            .iter()
            .find(|row| row["article"].as_deref() == Some(a3_iri.as_str()))
            .unwrap();
        assert!(a3["text"].is_none());
    }

    #[test]
    fn test_union_drops_binding_without_matching_branch() {
        let graph = fixture();
        let rows = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(RDF_TYPE), iri(p("Article")))
            .union(vec![
                vec![TriplePattern::new(
                    var("article"),
                    iri(p("definesTerm")),
                    var("term"),
                )],
                vec![TriplePattern::new(
                    var("article"),
                    iri(p("usesTerm")),
                    var("term"),
                )],
            ])
            .execute(&graph)
            .unwrap();
        // a3 has neither branch and disappears.
        let ids: Vec<_> = rows
            .iter()
            .map(|row| row["article"].clone().unwrap())
            .collect();
        assert_eq!(ids, vec![p("a1"), p("a2")]);
    }

    #[test]
    fn test_ground_literal_ignores_language_tag() {
        let graph = fixture();
        // The stored text carries @ru; the untagged pattern still matches.
        let rows = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(p("hasText")), literal("Прочие положения"))
            .execute(&graph)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["article"].as_deref(), Some(p("a2").as_str()));
    }

    #[test]
    fn test_variable_reuse_must_agree() {
        let mut graph = fixture();
        graph.insert(Triple::new(
            &p("a1"),
            &p("references"),
            Node::iri(p("a1")),
        ));
        graph.insert(Triple::new(
            &p("a2"),
            &p("references"),
            Node::iri(p("a3")),
        ));
        let rows = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(p("references")), var("article"))
            .execute(&graph)
            .unwrap();
        // Only the self-reference satisfies both positions.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["article"].as_deref(), Some(p("a1").as_str()));
    }

    #[test]
    fn test_filter_regex_matches() {
        let graph = fixture();
        let rows = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(p("hasText")), var("text"))
            .filter_regex("text", r"(?i)договор\w*\s+аренды")
            .execute(&graph)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["article"].as_deref(), Some(p("a1").as_str()));
    }

    #[test]
    fn test_invalid_filter_regex_reports_query() {
        let graph = fixture();
        let err = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(RDF_TYPE), iri(p("Article")))
            .filter_regex("article", "(unclosed")
            .execute(&graph)
            .unwrap_err();
        match err {
            PipelineError::QueryExecution { pattern, .. } => {
                assert!(pattern.contains("FILTER REGEX"));
            }
            other => panic!("expected QueryExecution, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_on_unbound_variable_drops_rows() {
        let graph = fixture();
        let rows = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(RDF_TYPE), iri(p("Article")))
            .optional(vec![TriplePattern::new(
                var("article"),
                iri(p("hasText")),
                var("text"),
            )])
            .filter_contains_ci("text", "положения")
            .execute(&graph)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["article"].as_deref(), Some(p("a2").as_str()));
    }

    #[test]
    fn test_limit_truncates_before_projection() {
        let graph = fixture();
        let rows = SelectQuery::select(&["article"])
            .pattern(var("article"), iri(RDF_TYPE), iri(p("Article")))
            .limit(2)
            .execute(&graph)
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_render_is_sparql_like() {
        let query = SelectQuery::select(&["a"])
            .pattern(var("a"), iri(p("hasNumber")), literal("1"))
            .filter_contains_ci("a", "x")
            .limit(5);
        let rendered = query.render();
        assert!(rendered.starts_with("SELECT ?a WHERE {"));
        assert!(rendered.contains("<http://law.test/#hasNumber>"));
        assert!(rendered.ends_with("LIMIT 5"));
    }
}
