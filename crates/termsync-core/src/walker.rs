//! Breadth-first discovery of every concept below a subroot.
//!
//! The walk follows `narrower` edges level by level. Each level is the
//! concatenation, in frontier order, of the narrower targets of every node of
//! the previous level. A node reachable along several paths is emitted once
//! per path; callers that count nodes see those repeats.

use tracing::{debug, trace};

use crate::defaults::MAX_WALK_DEPTH;
use crate::error::{Error, Result};
use crate::graph::{vocab, ConceptGraph, ConceptNode};

/// Result of a walk.
#[derive(Debug, Clone)]
pub struct WalkOutcome<'g> {
    /// Descendants in discovery order, subroot excluded.
    pub nodes: Vec<&'g ConceptNode>,
    /// Number of frontier expansions that produced at least one node.
    pub levels: usize,
}

impl<'g> WalkOutcome<'g> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Walk from the concept identified by `subroot_uri`.
pub fn walk_from<'g>(graph: &'g ConceptGraph, subroot_uri: &str) -> Result<WalkOutcome<'g>> {
    let subroot = graph.resolve(subroot_uri, "collection subroot")?;
    walk(graph, subroot)
}

/// Walk every descendant of `subroot` via `narrower` edges.
pub fn walk<'g>(graph: &'g ConceptGraph, subroot: &'g ConceptNode) -> Result<WalkOutcome<'g>> {
    walk_with_limit(graph, subroot, MAX_WALK_DEPTH)
}

/// Same as [`walk`] with an explicit level ceiling.
pub fn walk_with_limit<'g>(
    graph: &'g ConceptGraph,
    subroot: &'g ConceptNode,
    max_depth: usize,
) -> Result<WalkOutcome<'g>> {
    let mut nodes = Vec::new();
    let mut frontier = vec![subroot];
    let mut levels = 0;

    loop {
        let next = expand(graph, &frontier)?;
        if next.is_empty() {
            break;
        }
        if levels == max_depth {
            return Err(Error::WalkDepthExceeded {
                subroot: subroot.uri().to_string(),
                max_depth,
            });
        }
        levels += 1;
        trace!(
            subsystem = "core",
            component = "walker",
            level = levels,
            width = next.len(),
            "Frontier expanded"
        );
        nodes.extend(next.iter().copied());
        frontier = next;
    }

    debug!(
        subsystem = "core",
        component = "walker",
        op = "walk",
        uri = subroot.uri(),
        levels,
        record_count = nodes.len(),
        "Walk complete"
    );

    Ok(WalkOutcome { nodes, levels })
}

/// Narrower targets of every frontier node, in frontier order.
fn expand<'g>(graph: &'g ConceptGraph, frontier: &[&'g ConceptNode]) -> Result<Vec<&'g ConceptNode>> {
    let mut next = Vec::new();
    for node in frontier {
        for edge in node.edges_of_kind(vocab::NARROWER) {
            next.push(graph.resolve(&edge.target, node.uri())?);
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(uri: &str, narrower: &[&str]) -> ConceptNode {
        narrower
            .iter()
            .fold(ConceptNode::new(uri), |n, t| n.with_edge(vocab::NARROWER, t))
    }

    fn uris(outcome: &WalkOutcome<'_>) -> Vec<String> {
        outcome.nodes.iter().map(|n| n.uri().to_string()).collect()
    }

    #[test]
    fn test_walk_levels_in_discovery_order() {
        // S -> A -> B, A -> C
        let graph: ConceptGraph = [
            concept("S", &["A"]),
            concept("A", &["B", "C"]),
            concept("B", &[]),
            concept("C", &[]),
        ]
        .into_iter()
        .collect();

        let outcome = walk_from(&graph, "S").unwrap();
        assert_eq!(uris(&outcome), vec!["A", "B", "C"]);
        assert_eq!(outcome.levels, 2);
    }

    #[test]
    fn test_walk_excludes_subroot_and_unrelated_nodes() {
        let graph: ConceptGraph = [
            concept("S", &["A"]),
            concept("A", &[]),
            concept("Other", &["S"]),
        ]
        .into_iter()
        .collect();

        let outcome = walk_from(&graph, "S").unwrap();
        assert_eq!(uris(&outcome), vec!["A"]);
    }

    #[test]
    fn test_walk_leaf_subroot_is_empty() {
        let graph: ConceptGraph = [concept("S", &[])].into_iter().collect();
        let outcome = walk_from(&graph, "S").unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.levels, 0);
    }

    #[test]
    fn test_walk_ignores_broader_and_related_edges() {
        let graph: ConceptGraph = [
            concept("S", &["A"]),
            concept("A", &[])
                .with_edge(vocab::BROADER, "S")
                .with_edge(vocab::RELATED, "X"),
            concept("X", &[]),
        ]
        .into_iter()
        .collect();

        let outcome = walk_from(&graph, "S").unwrap();
        assert_eq!(uris(&outcome), vec!["A"]);
    }

    #[test]
    fn test_walk_keeps_nodes_reached_by_two_paths() {
        // S -> A -> D, S -> B -> D
        let graph: ConceptGraph = [
            concept("S", &["A", "B"]),
            concept("A", &["D"]),
            concept("B", &["D"]),
            concept("D", &[]),
        ]
        .into_iter()
        .collect();

        let outcome = walk_from(&graph, "S").unwrap();
        assert_eq!(uris(&outcome), vec!["A", "B", "D", "D"]);
    }

    #[test]
    fn test_walk_levels_equal_depth() {
        let graph: ConceptGraph = [
            concept("S", &["L1"]),
            concept("L1", &["L2a", "L2b"]),
            concept("L2a", &["L3"]),
            concept("L2b", &[]),
            concept("L3", &["L4"]),
            concept("L4", &[]),
        ]
        .into_iter()
        .collect();

        let outcome = walk_from(&graph, "S").unwrap();
        assert_eq!(outcome.levels, 4);
        assert_eq!(outcome.len(), 5);
    }

    #[test]
    fn test_walk_missing_target_fails() {
        let graph: ConceptGraph = [concept("S", &["A"]), concept("A", &["Ghost"])]
            .into_iter()
            .collect();

        let err = walk_from(&graph, "S").unwrap_err();
        match err {
            Error::GraphLookup {
                uri,
                referenced_from,
            } => {
                assert_eq!(uri, "Ghost");
                assert_eq!(referenced_from, "A");
            }
            other => panic!("expected GraphLookup, got {other:?}"),
        }
    }

    #[test]
    fn test_walk_missing_subroot_fails() {
        let graph = ConceptGraph::new();
        assert!(matches!(
            walk_from(&graph, "S"),
            Err(Error::GraphLookup { .. })
        ));
    }

    #[test]
    fn test_walk_cycle_hits_depth_ceiling() {
        let graph: ConceptGraph = [concept("S", &["A"]), concept("A", &["S"])]
            .into_iter()
            .collect();
        let subroot = graph.get("S").unwrap();

        let err = walk_with_limit(&graph, subroot, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::WalkDepthExceeded { max_depth: 8, .. }
        ));
    }

    #[test]
    fn test_walk_exactly_at_ceiling_succeeds() {
        let graph: ConceptGraph = [
            concept("S", &["A"]),
            concept("A", &["B"]),
            concept("B", &[]),
        ]
        .into_iter()
        .collect();
        let subroot = graph.get("S").unwrap();

        let outcome = walk_with_limit(&graph, subroot, 2).unwrap();
        assert_eq!(outcome.levels, 2);
    }
}
