//! Test utilities for aggregraph-core

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::*;

/// Add a labeled 30x30 node centered at (x, y).
pub fn add_node(graph: &mut Graph, label: &str, x: f64, y: f64) -> NodeId {
    let layout = Rect::from_center(Point::new(x, y), Size::new(30.0, 30.0));
    graph.add_node(GraphNode::labeled(label, layout)).unwrap()
}

pub fn add_edge(graph: &mut Graph, source: NodeId, target: NodeId) -> EdgeId {
    graph.add_edge(GraphEdge::between(source, target)).unwrap()
}

/// Nodes A, B, C, D with edges A→C, B→C, B→D.
pub struct Abcd {
    pub graph: Graph,
    pub a: NodeId,
    pub b: NodeId,
    pub c: NodeId,
    pub d: NodeId,
    pub ac: EdgeId,
    pub bc: EdgeId,
    pub bd: EdgeId,
}

impl Abcd {
    pub fn new() -> Self {
        let mut graph = Graph::new();
        let a = add_node(&mut graph, "A", 0.0, 0.0);
        let b = add_node(&mut graph, "B", 0.0, 100.0);
        let c = add_node(&mut graph, "C", 200.0, 0.0);
        let d = add_node(&mut graph, "D", 200.0, 100.0);
        let ac = add_edge(&mut graph, a, c);
        let bc = add_edge(&mut graph, b, c);
        let bd = add_edge(&mut graph, b, d);
        Abcd {
            graph,
            a,
            b,
            c,
            d,
            ac,
            bc,
            bd,
        }
    }
}

/// Two pairs of nodes wired across plus one external node:
/// a1→b1, a2→b2, b2→e.
pub struct TwoPairs {
    pub graph: Graph,
    pub a1: NodeId,
    pub a2: NodeId,
    pub b1: NodeId,
    pub b2: NodeId,
    pub e: NodeId,
    pub a1b1: EdgeId,
    pub a2b2: EdgeId,
    pub b2e: EdgeId,
}

impl TwoPairs {
    pub fn new() -> Self {
        let mut graph = Graph::new();
        let a1 = add_node(&mut graph, "a1", 0.0, 0.0);
        let a2 = add_node(&mut graph, "a2", 0.0, 100.0);
        let b1 = add_node(&mut graph, "b1", 200.0, 0.0);
        let b2 = add_node(&mut graph, "b2", 200.0, 100.0);
        let e = add_node(&mut graph, "e", 400.0, 50.0);
        let a1b1 = add_edge(&mut graph, a1, b1);
        let a2b2 = add_edge(&mut graph, a2, b2);
        let b2e = add_edge(&mut graph, b2, e);
        TwoPairs {
            graph,
            a1,
            a2,
            b1,
            b2,
            e,
            a1b1,
            a2b2,
            b2e,
        }
    }
}

/// Collect every delivered change batch.
pub fn record_batches(graph: &mut AggregateGraph) -> Rc<RefCell<Vec<ChangeBatch>>> {
    let batches = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&batches);
    graph.subscribe(move |batch| sink.borrow_mut().push(batch.clone()));
    batches
}

pub fn visible_original_nodes(graph: &AggregateGraph) -> BTreeSet<NodeId> {
    graph.original_nodes().collect()
}

/// Visible original edges as (source, target) pairs.
pub fn visible_original_edges(graph: &AggregateGraph) -> BTreeSet<(NodeId, NodeId)> {
    graph
        .original_edges()
        .filter_map(|id| graph.wrapped_graph().edge(id))
        .map(|e| (e.source, e.target))
        .collect()
}

pub fn all_original_edges(graph: &Graph) -> BTreeSet<(NodeId, NodeId)> {
    graph.all_edges().map(|e| (e.source, e.target)).collect()
}

/// Visible synthetic edges between two nodes, in either direction.
pub fn synthetic_edges_between(graph: &AggregateGraph, a: NodeRef, b: NodeRef) -> Vec<AggregationEdgeId> {
    graph
        .aggregation_edges()
        .filter(|id| {
            graph
                .edge_endpoints(EdgeRef::Aggregation(*id))
                .is_some_and(|(s, t)| (s == a && t == b) || (s == b && t == a))
        })
        .collect()
}

/// Original items replaced by a synthetic edge, as a set.
pub fn replaced_originals(graph: &AggregateGraph, edge: AggregationEdgeId) -> BTreeSet<EdgeId> {
    graph
        .all_aggregated_original_items(Item::Edge(EdgeRef::Aggregation(edge)))
        .into_iter()
        .filter_map(|item| match item {
            Item::Edge(EdgeRef::Original(id)) => Some(id),
            _ => None,
        })
        .collect()
}

/// Deterministic pseudo random numbers for operation sequences.
pub struct Lcg(pub u64);

impl Lcg {
    pub fn below(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abcd_fixture() {
        let fixture = Abcd::new();
        assert_eq!(fixture.graph.node_count(), 4);
        assert_eq!(fixture.graph.edge_count(), 3);
        assert_eq!(fixture.graph.find_node_by_label("C"), Some(fixture.c));
    }
}
