//! In-memory concept graph handed to the walker by the deserializer.
//!
//! Edges are stored by target URI, not inline, so following an edge is an
//! index lookup that can fail when the document references a concept it
//! does not describe.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Edge and attribute names used by the harvest.
pub mod vocab {
    pub const NARROWER: &str = "narrower";
    pub const BROADER: &str = "broader";
    pub const RELATED: &str = "related";
    pub const PREF_LABEL: &str = "prefLabel";
    pub const DEFINITION: &str = "definition";
    pub const MODIFIED: &str = "modified";
}

/// Typed outbound edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub kind: String,
    pub target: String,
}

/// One concept of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptNode {
    uri: String,
    attributes: HashMap<String, String>,
    edges: Vec<Edge>,
}

impl ConceptNode {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            attributes: HashMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Leaf attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set a leaf attribute. The first value of a repeated attribute wins.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.entry(name.into()).or_insert_with(|| value.into());
    }

    pub fn add_edge(&mut self, kind: impl Into<String>, target: impl Into<String>) {
        self.edges.push(Edge {
            kind: kind.into(),
            target: target.into(),
        });
    }

    /// Outbound edges in document order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Builder-style attribute setter, mostly for tests and fixtures.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style edge adder, mostly for tests and fixtures.
    pub fn with_edge(mut self, kind: &str, target: &str) -> Self {
        self.add_edge(kind, target);
        self
    }
}

/// Concept nodes indexed by URI.
#[derive(Debug, Clone, Default)]
pub struct ConceptGraph {
    nodes: Vec<ConceptNode>,
    index: HashMap<String, usize>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A node with the same URI is merged into the existing one
    /// (RDF allows several descriptions of one subject).
    pub fn insert(&mut self, node: ConceptNode) {
        match self.index.get(&node.uri) {
            Some(&i) => {
                let existing = &mut self.nodes[i];
                for (name, value) in node.attributes {
                    existing.set_attribute(name, value);
                }
                existing.edges.extend(node.edges);
            }
            None => {
                self.index.insert(node.uri.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// Mutable access to the node for `uri`, creating it when absent.
    pub fn node_mut(&mut self, uri: &str) -> &mut ConceptNode {
        let i = match self.index.get(uri) {
            Some(&i) => i,
            None => {
                self.index.insert(uri.to_string(), self.nodes.len());
                self.nodes.push(ConceptNode::new(uri));
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[i]
    }

    pub fn get(&self, uri: &str) -> Option<&ConceptNode> {
        self.index.get(uri).map(|&i| &self.nodes[i])
    }

    /// Follow a reference to `uri` found on `referenced_from`.
    pub fn resolve(&self, uri: &str, referenced_from: &str) -> Result<&ConceptNode> {
        self.get(uri).ok_or_else(|| Error::GraphLookup {
            uri: uri.to_string(),
            referenced_from: referenced_from.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConceptNode> {
        self.nodes.iter()
    }
}

impl FromIterator<ConceptNode> for ConceptGraph {
    fn from_iter<I: IntoIterator<Item = ConceptNode>>(iter: I) -> Self {
        let mut graph = ConceptGraph::new();
        for node in iter {
            graph.insert(node);
        }
        graph
    }
}
