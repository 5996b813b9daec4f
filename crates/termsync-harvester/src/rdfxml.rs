//! RDF/XML reader for SKOS registry documents.
//!
//! Handles the striped subset registries publish:
//! - any element carrying `rdf:about` is a concept node (`skos:Concept`,
//!   `rdf:Description`, ...)
//! - property elements with `rdf:resource="..."` are edges
//! - property elements with text content are leaf attributes
//! - a node element nested inside a property element is a node of its own
//!   plus an edge from the enclosing node
//!
//! SKOS and Dublin Core terms properties are keyed by local name
//! (`narrower`, `prefLabel`, `modified`); anything else by its full IRI.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use termsync_core::{ConceptGraph, Error, Result};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";

/// Namespaces whose properties are keyed by local name.
const SHORT_KEY_NAMESPACES: &[&str] = &[SKOS_NS, DCTERMS_NS];

/// Open element on the parse stack.
enum Frame {
    /// `rdf:RDF` or an element outside any node.
    Container,
    /// Node element; `None` for blank nodes, whose properties are ignored.
    Node(Option<String>),
    Property(PropertyFrame),
}

/// Bindings an element's `xmlns` declarations replaced, restored when the
/// element closes. `None` means the prefix was unbound.
type Shadowed = Vec<(String, Option<String>)>;

struct PropertyFrame {
    subject: Option<String>,
    key: String,
    resource: Option<String>,
    text: String,
    /// A node element was nested inside, so the text is not a literal.
    nested: bool,
}

/// Parse an RDF/XML document into a concept graph.
pub fn parse(content: &str) -> Result<ConceptGraph> {
    let mut reader = Reader::from_str(content);
    let mut graph = ConceptGraph::new();
    let mut namespaces: HashMap<String, String> = HashMap::new();
    let mut stack: Vec<(Frame, Shadowed)> = Vec::new();
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::Parse(format!("at byte {}: {e}", reader.buffer_position()))
        })?;
        match event {
            Event::Start(ref e) => {
                saw_root = true;
                let shadowed = collect_namespaces(e, &mut namespaces)?;
                let parent = stack.last_mut().map(|(frame, _)| frame);
                let frame = open_element(e, parent, &namespaces, &mut graph)?;
                stack.push((frame, shadowed));
            }
            Event::Empty(ref e) => {
                saw_root = true;
                let shadowed = collect_namespaces(e, &mut namespaces)?;
                let parent = stack.last_mut().map(|(frame, _)| frame);
                let frame = open_element(e, parent, &namespaces, &mut graph)?;
                close_element(frame, &mut graph);
                restore_namespaces(shadowed, &mut namespaces);
            }
            Event::Text(ref e) => {
                if let Some((Frame::Property(p), _)) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::Parse(format!("bad text content: {err}")))?;
                    p.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some((Frame::Property(p), _)) = stack.last_mut() {
                    p.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some((frame, shadowed)) = stack.pop() {
                    close_element(frame, &mut graph);
                    restore_namespaces(shadowed, &mut namespaces);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::Parse("document has no root element".into()));
    }
    if !stack.is_empty() {
        return Err(Error::Parse("unexpected end of document".into()));
    }

    debug!(
        subsystem = "harvest",
        component = "rdfxml",
        node_count = graph.len(),
        "Document parsed"
    );
    Ok(graph)
}

/// Classify a start tag by its position and build its frame.
fn open_element(
    e: &BytesStart<'_>,
    parent: Option<&mut Frame>,
    namespaces: &HashMap<String, String>,
    graph: &mut ConceptGraph,
) -> Result<Frame> {
    let (prefix, local) = split_qname(e.name().as_ref());

    match parent {
        Some(Frame::Node(subject)) => {
            let key = property_key(&prefix, &local, namespaces)?;
            Ok(Frame::Property(PropertyFrame {
                subject: subject.clone(),
                key,
                resource: rdf_attr(e, "resource", namespaces)?,
                text: String::new(),
                nested: false,
            }))
        }
        parent => {
            if local == "RDF" && is_rdf_prefix(&prefix, namespaces) {
                return Ok(Frame::Container);
            }
            let about = rdf_attr(e, "about", namespaces)?;
            if let Some(uri) = &about {
                graph.node_mut(uri);
            }
            if let Some(Frame::Property(p)) = parent {
                p.nested = true;
                if let (Some(subject), Some(uri)) = (&p.subject, &about) {
                    graph.node_mut(subject).add_edge(p.key.clone(), uri.clone());
                }
            }
            Ok(Frame::Node(about))
        }
    }
}

fn close_element(frame: Frame, graph: &mut ConceptGraph) {
    let Frame::Property(p) = frame else {
        return;
    };
    let Some(subject) = p.subject else {
        return;
    };
    if let Some(target) = p.resource {
        graph.node_mut(&subject).add_edge(p.key, target);
    } else if !p.nested {
        graph.node_mut(&subject).set_attribute(p.key, p.text);
    }
}

/// Split a qualified XML name (e.g., b"skos:Concept") into (prefix, local).
fn split_qname(name: &[u8]) -> (String, String) {
    let name = String::from_utf8_lossy(name);
    match name.split_once(':') {
        Some((prefix, local)) => (prefix.to_string(), local.to_string()),
        None => (String::new(), name.to_string()),
    }
}

fn is_rdf_prefix(prefix: &str, namespaces: &HashMap<String, String>) -> bool {
    namespaces.get(prefix).is_some_and(|ns| ns == RDF_NS)
}

/// Apply an element's `xmlns` declarations and return the bindings they
/// replaced. The default namespace is stored under "".
fn collect_namespaces(
    e: &BytesStart<'_>,
    namespaces: &mut HashMap<String, String>,
) -> Result<Shadowed> {
    let mut shadowed = Shadowed::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.0);
        let prefix = if key == "xmlns" {
            ""
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            prefix
        } else {
            continue;
        };
        let value = attr
            .unescape_value()
            .map_err(|err| Error::Parse(format!("bad namespace declaration: {err}")))?;
        let previous = namespaces.insert(prefix.to_string(), value.into_owned());
        shadowed.push((prefix.to_string(), previous));
    }
    Ok(shadowed)
}

/// Undo [`collect_namespaces`] for an element that closed.
fn restore_namespaces(shadowed: Shadowed, namespaces: &mut HashMap<String, String>) {
    // Reverse order handles a prefix declared twice on one element.
    for (prefix, previous) in shadowed.into_iter().rev() {
        match previous {
            Some(ns) => namespaces.insert(prefix, ns),
            None => namespaces.remove(&prefix),
        };
    }
}

/// Value of an RDF attribute (`rdf:about`, `rdf:resource`). Unprefixed
/// attributes are accepted too.
fn rdf_attr(
    e: &BytesStart<'_>,
    attr_local: &str,
    namespaces: &HashMap<String, String>,
) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        let (prefix, local) = split_qname(attr.key.0);
        if local != attr_local || !(prefix.is_empty() || is_rdf_prefix(&prefix, namespaces)) {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|err| Error::Parse(format!("bad rdf:{attr_local} value: {err}")))?;
        return Ok(Some(value.trim().to_string()));
    }
    Ok(None)
}

/// Graph key for a property element.
fn property_key(prefix: &str, local: &str, namespaces: &HashMap<String, String>) -> Result<String> {
    let ns = namespaces
        .get(prefix)
        .ok_or_else(|| Error::Parse(format!("unknown namespace prefix {prefix:?} on {local}")))?;
    if SHORT_KEY_NAMESPACES.contains(&ns.as_str()) {
        Ok(local.to_string())
    } else {
        Ok(format!("{ns}{local}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termsync_core::vocab;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xmlns:dc="http://purl.org/dc/terms/"
         xmlns:owl="http://www.w3.org/2002/07/owl#">
  <skos:Collection rdf:about="http://v/collection/L05/current/">
    <skos:member rdf:resource="http://v/collection/L05/current/1/"/>
  </skos:Collection>
  <skos:Concept rdf:about="http://v/collection/L05/current/1/">
    <skos:prefLabel xml:lang="en">Sediment &amp; rock</skos:prefLabel>
    <skos:definition>Solid material.</skos:definition>
    <dc:modified>2021-03-04 10:11:12.0</dc:modified>
    <skos:narrower rdf:resource="http://v/collection/L05/current/2/"/>
    <skos:related rdf:resource="http://v/collection/L22/current/9/"/>
    <owl:sameAs rdf:resource="http://elsewhere/x"/>
    <skos:prefLabel>Second label</skos:prefLabel>
  </skos:Concept>
  <rdf:Description rdf:about="http://v/collection/L05/current/2/">
    <skos:prefLabel>Sand</skos:prefLabel>
    <skos:definition><![CDATA[Grains <2mm]]></skos:definition>
    <dc:modified>2021-03-05</dc:modified>
    <skos:broader>
      <skos:Concept rdf:about="http://v/collection/L05/current/1/"/>
    </skos:broader>
  </rdf:Description>
</rdf:RDF>"#;

    #[test]
    fn test_parse_nodes_and_attributes() {
        let graph = parse(DOC).unwrap();
        assert_eq!(graph.len(), 3);

        let one = graph.get("http://v/collection/L05/current/1/").unwrap();
        assert_eq!(one.attribute(vocab::PREF_LABEL), Some("Sediment & rock"));
        assert_eq!(one.attribute(vocab::DEFINITION), Some("Solid material."));
        assert_eq!(one.attribute(vocab::MODIFIED), Some("2021-03-04 10:11:12.0"));
    }

    #[test]
    fn test_parse_edges_by_kind() {
        let graph = parse(DOC).unwrap();
        let one = graph.get("http://v/collection/L05/current/1/").unwrap();

        let narrower: Vec<&str> = one
            .edges_of_kind(vocab::NARROWER)
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(narrower, vec!["http://v/collection/L05/current/2/"]);
        assert_eq!(one.edges_of_kind(vocab::RELATED).count(), 1);
        assert_eq!(
            one.edges_of_kind("http://www.w3.org/2002/07/owl#sameAs").count(),
            1
        );
    }

    #[test]
    fn test_nested_node_becomes_edge() {
        let graph = parse(DOC).unwrap();
        let two = graph.get("http://v/collection/L05/current/2/").unwrap();
        let broader: Vec<&str> = two
            .edges_of_kind(vocab::BROADER)
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(broader, vec!["http://v/collection/L05/current/1/"]);
        assert_eq!(two.attribute(vocab::BROADER), None);
        assert_eq!(two.attribute(vocab::DEFINITION), Some("Grains <2mm"));
    }

    #[test]
    fn test_namespace_redeclaration_ends_with_element() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                 xmlns:s="http://www.w3.org/2004/02/skos/core#">
          <s:Concept rdf:about="http://v/1" xmlns:s="http://example/ext#">
            <s:prefLabel>Inner</s:prefLabel>
          </s:Concept>
          <s:Concept rdf:about="http://v/2">
            <s:note xmlns:s="http://example/ext#" rdf:resource="http://v/z"/>
            <s:prefLabel>Outer</s:prefLabel>
            <s:narrower rdf:resource="http://v/1"/>
          </s:Concept>
        </rdf:RDF>"#;
        let graph = parse(doc).unwrap();

        let one = graph.get("http://v/1").unwrap();
        assert_eq!(one.attribute("http://example/ext#prefLabel"), Some("Inner"));
        assert_eq!(one.attribute(vocab::PREF_LABEL), None);

        let two = graph.get("http://v/2").unwrap();
        assert_eq!(two.attribute(vocab::PREF_LABEL), Some("Outer"));
        assert_eq!(two.edges_of_kind("http://example/ext#note").count(), 1);
        assert_eq!(two.edges_of_kind(vocab::NARROWER).count(), 1);
    }

    #[test]
    fn test_repeated_attribute_keeps_first() {
        let graph = parse(DOC).unwrap();
        let one = graph.get("http://v/collection/L05/current/1/").unwrap();
        assert_eq!(one.attribute(vocab::PREF_LABEL), Some("Sediment & rock"));
    }

    #[test]
    fn test_default_namespace() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns="http://www.w3.org/2004/02/skos/core#">
            <Concept rdf:about="http://v/a"><prefLabel>A</prefLabel></Concept>
        </rdf:RDF>"#;
        let graph = parse(doc).unwrap();
        assert_eq!(graph.get("http://v/a").unwrap().attribute("prefLabel"), Some("A"));
    }

    #[test]
    fn test_blank_node_properties_ignored() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                              xmlns:skos="http://www.w3.org/2004/02/skos/core#">
            <rdf:Description><skos:prefLabel>anonymous</skos:prefLabel></rdf:Description>
        </rdf:RDF>"#;
        assert!(parse(doc).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\"><a></b>")
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_truncated_document() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
            <rdf:Description rdf:about="http://v/a">"#;
        assert!(matches!(parse(doc), Err(Error::Parse(_))));
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(parse(""), Err(Error::Parse(_))));
    }

    #[test]
    fn test_unknown_prefix() {
        let doc = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
            <rdf:Description rdf:about="http://v/a"><zz:label>x</zz:label></rdf:Description>
        </rdf:RDF>"#;
        let err = parse(doc).unwrap_err();
        assert!(err.to_string().contains("zz"));
    }
}
