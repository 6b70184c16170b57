//! # RDF/XML Persistence
//!
//! ## Purpose
//! Wholesale serialization of the triple graph to RDF/XML and a tolerant
//! loader for reading it back. Graph files can come back from earlier runs
//! or hand edits with stray control bytes, broken encodings or bare
//! ampersands; the loader sanitizes such files into a `.sanitized` sibling
//! and retries once before giving up.
//!
//! ## Input/Output Specification
//! - **Input**: `TripleGraph` + namespace for writing; a file path for
//!   reading
//! - **Output**: An RDF/XML file with one `rdf:Description` per subject;
//!   a reconstructed `TripleGraph` on load
//!
//! ## Key Features
//! - `rdf:resource` for IRI objects, `xml:lang` / `rdf:datatype` for
//!   literals
//! - Prefix resolution from `xmlns` declarations on read
//! - Three-step sanitizer: drop forbidden control bytes, lossy UTF-8
//!   decode, escape ampersands that do not start a recognized entity

use crate::errors::{PipelineError, Result};
use crate::ontology::graph::{Node, Triple, TripleGraph};
use crate::ontology::vocab::RDF_NS;
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialize `graph` to `path`, creating parent directories as needed.
pub fn save_graph(graph: &TripleGraph, namespace: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| save_error(path, format!("cannot create parent directory: {e}")))?;
        }
    }
    let bytes = render_rdfxml(graph, namespace, path)?;
    fs::write(path, bytes).map_err(|e| save_error(path, e.to_string()))?;
    Ok(())
}

/// Load a graph from `path`, sanitizing and retrying once on parse failure.
///
/// The sanitized copy is written next to the original as
/// `<stem>.sanitized.<ext>` so the broken input stays available for
/// inspection. A failure after sanitizing is not recoverable.
pub fn load_graph(path: &Path) -> Result<TripleGraph> {
    let raw = fs::read(path)?;
    match parse_attempt(&raw, path) {
        Ok(graph) => Ok(graph),
        Err(first) => {
            tracing::warn!(
                "RDF/XML parse failed for {}, sanitizing and retrying: {}",
                path.display(),
                first
            );
            let sanitized = sanitize_rdfxml(&raw)?;
            let sibling = sanitized_sibling(path);
            fs::write(&sibling, sanitized.as_bytes())?;
            match parse_attempt(sanitized.as_bytes(), &sibling) {
                Ok(graph) => {
                    tracing::info!(
                        "Recovered {} triples from sanitized copy {}",
                        graph.len(),
                        sibling.display()
                    );
                    Ok(graph)
                }
                Err(second) => Err(PipelineError::GraphLoad {
                    path: path.display().to_string(),
                    details: format!("unrecoverable after sanitizing: {second}"),
                }),
            }
        }
    }
}

fn parse_attempt(bytes: &[u8], path: &Path) -> Result<TripleGraph> {
    let malformed = |details: String| PipelineError::MalformedGraph {
        path: path.display().to_string(),
        details,
    };
    // The XML reader tolerates control bytes; reject them up front so the
    // sanitizer gets a chance to clean the file.
    if let Some(byte) = bytes
        .iter()
        .find(|b| **b < 0x20 && !matches!(**b, 9 | 10 | 13))
    {
        return Err(malformed(format!("forbidden control byte 0x{byte:02X}")));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| malformed(format!("invalid UTF-8: {e}")))?;
    parse_rdfxml(text).map_err(malformed)
}

/// Sibling path the sanitized copy is written to.
fn sanitized_sibling(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("graph");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.sanitized.{ext}"),
        None => format!("{stem}.sanitized"),
    };
    path.with_file_name(name)
}

/// Repair the byte stream of a damaged RDF/XML file.
fn sanitize_rdfxml(bytes: &[u8]) -> Result<String> {
    // 1. Drop control bytes XML 1.0 forbids outright.
    let filtered: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|b| *b >= 0x20 || matches!(b, 9 | 10 | 13))
        .collect();
    // 2. Decode leniently, replacing undecodable sequences.
    let text = String::from_utf8_lossy(&filtered);
    // 3. Escape ampersands that do not start a recognized entity reference.
    let entity_guard = Regex::new(r"&(amp;|lt;|gt;|quot;|apos;|#[0-9]+;|#x[0-9A-Fa-f]+;)?")
        .map_err(|e| PipelineError::Internal {
            message: format!("Sanitizer regex failed to compile: {e}"),
        })?;
    let escaped = entity_guard.replace_all(&text, |caps: &regex::Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_string()
        } else {
            "&amp;".to_string()
        }
    });
    Ok(escaped.into_owned())
}

fn save_error(path: &Path, details: String) -> PipelineError {
    PipelineError::GraphSave {
        path: path.display().to_string(),
        details,
    }
}

fn emit<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>, path: &Path) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| save_error(path, e.to_string()))
}

fn render_rdfxml(graph: &TripleGraph, namespace: &str, path: &Path) -> Result<Vec<u8>> {
    // Group triples per subject so each resource serializes as one block.
    let mut by_subject: IndexMap<&str, Vec<&Triple>> = IndexMap::new();
    for triple in graph.iter() {
        by_subject.entry(triple.subject.as_str()).or_default().push(triple);
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        path,
    )?;

    let mut root = BytesStart::new("rdf:RDF");
    root.push_attribute(("xmlns:rdf", RDF_NS));
    root.push_attribute(("xmlns:law", namespace));
    emit(&mut writer, Event::Start(root), path)?;

    for (subject, triples) in &by_subject {
        let mut description = BytesStart::new("rdf:Description");
        description.push_attribute(("rdf:about", *subject));
        emit(&mut writer, Event::Start(description), path)?;

        for triple in triples {
            let (qname, extra_ns) = predicate_qname(&triple.predicate, namespace)
                .map_err(|details| save_error(path, details))?;
            let mut element = BytesStart::new(qname.as_str());
            if let Some((attribute, ns_iri)) = &extra_ns {
                element.push_attribute((attribute.as_str(), ns_iri.as_str()));
            }
            match &triple.object {
                Node::Iri(iri) => {
                    element.push_attribute(("rdf:resource", iri.as_str()));
                    emit(&mut writer, Event::Empty(element), path)?;
                }
                Node::Literal {
                    value,
                    lang,
                    datatype,
                } => {
                    if let Some(lang) = lang {
                        element.push_attribute(("xml:lang", lang.as_str()));
                    }
                    if let Some(datatype) = datatype {
                        element.push_attribute(("rdf:datatype", datatype.as_str()));
                    }
                    emit(&mut writer, Event::Start(element), path)?;
                    let clean = strip_forbidden_chars(value);
                    emit(&mut writer, Event::Text(BytesText::new(&clean)), path)?;
                    emit(&mut writer, Event::End(BytesEnd::new(qname.as_str())), path)?;
                }
            }
        }

        emit(&mut writer, Event::End(BytesEnd::new("rdf:Description")), path)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("rdf:RDF")), path)?;
    Ok(writer.into_inner())
}

/// Qualified name for a predicate IRI, plus an extra `xmlns` declaration
/// when the predicate lives outside the two standard namespaces.
fn predicate_qname(
    predicate: &str,
    namespace: &str,
) -> std::result::Result<(String, Option<(String, String)>), String> {
    if let Some(local) = predicate.strip_prefix(RDF_NS) {
        return Ok((format!("rdf:{local}"), None));
    }
    if let Some(local) = predicate.strip_prefix(namespace) {
        return Ok((format!("law:{local}"), None));
    }
    let split = predicate
        .rfind(|c| c == '#' || c == '/')
        .map(|i| i + 1)
        .unwrap_or(0);
    let local = &predicate[split..];
    if split == 0 || local.is_empty() {
        return Err(format!("predicate {predicate:?} has no serializable local name"));
    }
    Ok((
        format!("ns1:{local}"),
        Some(("xmlns:ns1".to_string(), predicate[..split].to_string())),
    ))
}

/// XML 1.0 cannot carry most control characters even escaped, so literal
/// values shed them at write time.
fn strip_forbidden_chars(value: &str) -> Cow<'_, str> {
    fn allowed(c: char) -> bool {
        c >= '\u{20}' || matches!(c, '\t' | '\n' | '\r')
    }
    if value.chars().all(allowed) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(value.chars().filter(|c| allowed(*c)).collect())
    }
}

/// A property element whose object is still being assembled.
struct PendingProperty {
    predicate: String,
    resource: Option<String>,
    lang: Option<String>,
    datatype: Option<String>,
    text: String,
}

impl PendingProperty {
    fn into_object(self) -> (String, Node) {
        let object = match self.resource {
            Some(resource) => Node::Iri(resource),
            None => Node::Literal {
                value: self.text,
                lang: self.lang,
                datatype: self.datatype,
            },
        };
        (self.predicate, object)
    }
}

fn parse_rdfxml(xml: &str) -> std::result::Result<TripleGraph, String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut graph = TripleGraph::new();
    // The rdf prefix is preseeded so minimal hand-written files resolve;
    // declarations in the file override it.
    let mut prefixes: HashMap<String, String> = HashMap::new();
    prefixes.insert("rdf".to_string(), RDF_NS.to_string());

    let description_iri = format!("{RDF_NS}Description");
    let about_iri = format!("{RDF_NS}about");
    let resource_iri = format!("{RDF_NS}resource");
    let datatype_iri = format!("{RDF_NS}datatype");

    let mut subject: Option<String> = None;
    let mut property: Option<PendingProperty> = None;
    // Markup nested inside a property element is ignored structurally but
    // must not terminate the property early.
    let mut nested = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let attrs = collect_attributes(&e)?;
                register_prefixes(&mut prefixes, &attrs);
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let resolved = resolve_name(&prefixes, &name);

                if property.is_some() {
                    nested += 1;
                } else if resolved.as_deref() == Some(description_iri.as_str()) {
                    subject = find_resolved(&prefixes, &attrs, &about_iri);
                } else if subject.is_some() {
                    if let Some(predicate) = resolved {
                        property = Some(PendingProperty {
                            predicate,
                            resource: find_resolved(&prefixes, &attrs, &resource_iri),
                            lang: find_raw(&attrs, "xml:lang"),
                            datatype: find_resolved(&prefixes, &attrs, &datatype_iri),
                            text: String::new(),
                        });
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let attrs = collect_attributes(&e)?;
                register_prefixes(&mut prefixes, &attrs);
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let resolved = resolve_name(&prefixes, &name);

                if property.is_none() && resolved.as_deref() != Some(description_iri.as_str()) {
                    if let (Some(subject), Some(predicate)) = (subject.as_deref(), resolved) {
                        let pending = PendingProperty {
                            predicate,
                            resource: find_resolved(&prefixes, &attrs, &resource_iri),
                            lang: find_raw(&attrs, "xml:lang"),
                            datatype: find_resolved(&prefixes, &attrs, &datatype_iri),
                            text: String::new(),
                        };
                        let (predicate, object) = pending.into_object();
                        graph.insert(Triple::new(subject, &predicate, object));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(property) = property.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| format!("bad text content: {err}"))?;
                    property.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(property) = property.as_mut() {
                    property.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                if nested > 0 {
                    nested -= 1;
                } else if let Some(pending) = property.take() {
                    if let Some(subject) = subject.as_deref() {
                        let (predicate, object) = pending.into_object();
                        graph.insert(Triple::new(subject, &predicate, object));
                    }
                } else {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if resolve_name(&prefixes, &name).as_deref() == Some(description_iri.as_str())
                    {
                        subject = None;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(format!(
                    "XML parse error at byte {}: {err}",
                    reader.buffer_position()
                ));
            }
        }
        buf.clear();
    }
    Ok(graph)
}

fn collect_attributes(
    element: &BytesStart<'_>,
) -> std::result::Result<Vec<(String, String)>, String> {
    let mut out = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|err| format!("bad attribute: {err}"))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| format!("bad attribute value: {err}"))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn register_prefixes(prefixes: &mut HashMap<String, String>, attrs: &[(String, String)]) {
    for (key, value) in attrs {
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            prefixes.insert(prefix.to_string(), value.clone());
        } else if key == "xmlns" {
            prefixes.insert(String::new(), value.clone());
        }
    }
}

/// Expand `prefix:local` (or a default-namespace name) into a full IRI.
fn resolve_name(prefixes: &HashMap<String, String>, raw: &str) -> Option<String> {
    match raw.split_once(':') {
        Some((prefix, local)) => prefixes.get(prefix).map(|ns| format!("{ns}{local}")),
        None => prefixes.get("").map(|ns| format!("{ns}{raw}")),
    }
}

/// Value of the attribute whose resolved name equals `target`.
fn find_resolved(
    prefixes: &HashMap<String, String>,
    attrs: &[(String, String)],
    target: &str,
) -> Option<String> {
    attrs.iter().find_map(|(key, value)| {
        if resolve_name(prefixes, key).as_deref() == Some(target) {
            Some(value.clone())
        } else {
            None
        }
    })
}

fn find_raw(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v.clone())
}
