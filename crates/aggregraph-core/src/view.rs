//! Read-only view of the currently visible items
//!
//! Iteration and `contains` share the same predicates, so an item is
//! iterated exactly when `contains` reports it.

use crate::model::*;
use crate::wrapper::{AggregateGraph, AggregationEdge, AggregationNode};

impl AggregateGraph {
    // ── Predicates ──────────────────────────────────────────

    /// Whether the node exists, visible or hidden.
    pub fn node_exists(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Original(id) => self.graph.contains_node(id),
            NodeRef::Aggregation(id) => self.nodes.contains_key(&id),
        }
    }

    /// Whether the edge exists, visible or hidden.
    pub fn edge_exists(&self, edge: EdgeRef) -> bool {
        match edge {
            EdgeRef::Original(id) => self.graph.contains_edge(id),
            EdgeRef::Aggregation(id) => self.edges.contains_key(&id),
        }
    }

    pub fn is_node_visible(&self, node: NodeRef) -> bool {
        self.node_exists(node) && !self.container.contains_key(&node)
    }

    pub fn is_edge_visible(&self, edge: EdgeRef) -> bool {
        self.edge_endpoints(edge)
            .is_some_and(|(s, t)| self.is_node_visible(s) && self.is_node_visible(t))
    }

    /// An existing item that is folded into an aggregate somewhere.
    pub fn is_hidden(&self, item: Item) -> bool {
        match item {
            Item::Node(node) => self.node_exists(node) && !self.is_node_visible(node),
            Item::Edge(edge) => self.edge_exists(edge) && !self.is_edge_visible(edge),
            _ => false,
        }
    }

    pub fn contains(&self, item: Item) -> bool {
        match item {
            Item::Node(node) => self.is_node_visible(node),
            Item::Edge(edge) => self.is_edge_visible(edge),
            Item::Port(port) => self.is_node_visible(port.owner()),
            Item::Label(label) => {
                let visible = match label.owner {
                    LabelOwner::Node(node) => self.is_node_visible(node),
                    LabelOwner::Edge(edge) => self.is_edge_visible(edge),
                };
                visible && label.index < self.owner_labels(label.owner).len()
            }
            Item::Bend(bend) => {
                self.is_edge_visible(bend.edge) && bend.index < self.edge_bends(bend.edge).len()
            }
        }
    }

    pub fn contains_node(&self, node: NodeRef) -> bool {
        self.is_node_visible(node)
    }

    pub fn contains_edge(&self, edge: EdgeRef) -> bool {
        self.is_edge_visible(edge)
    }

    // ── Iteration ───────────────────────────────────────────

    /// Visible nodes: original nodes first, then aggregation nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        let originals = self.graph.node_ids().map(NodeRef::Original);
        let synthetic = self.nodes.keys().map(|id| NodeRef::Aggregation(*id));
        originals
            .chain(synthetic)
            .filter(move |node| !self.container.contains_key(node))
    }

    /// Visible edges: original edges first, then aggregation edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        let originals = self.graph.edge_ids().map(EdgeRef::Original);
        let synthetic = self.edges.keys().map(|id| EdgeRef::Aggregation(*id));
        originals
            .chain(synthetic)
            .filter(move |edge| self.is_edge_visible(*edge))
    }

    pub fn ports(&self) -> impl Iterator<Item = PortRef> + '_ {
        self.nodes().map(PortRef)
    }

    pub fn labels(&self) -> impl Iterator<Item = LabelRef> + '_ {
        let node_labels = self.nodes().map(LabelOwner::Node);
        let edge_labels = self.edges().map(LabelOwner::Edge);
        node_labels.chain(edge_labels).flat_map(move |owner| {
            (0..self.owner_labels(owner).len()).map(move |index| LabelRef { owner, index })
        })
    }

    pub fn bends(&self) -> impl Iterator<Item = BendRef> + '_ {
        self.edges().flat_map(move |edge| {
            (0..self.edge_bends(edge).len()).map(move |index| BendRef { edge, index })
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Visible original nodes only.
    pub fn original_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes().filter_map(|n| n.as_original())
    }

    /// Visible original edges only.
    pub fn original_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges().filter_map(|e| e.as_original())
    }

    pub fn aggregation_nodes(&self) -> impl Iterator<Item = AggregationNodeId> + '_ {
        self.nodes().filter_map(|n| n.as_aggregation())
    }

    pub fn aggregation_edges(&self) -> impl Iterator<Item = AggregationEdgeId> + '_ {
        self.edges().filter_map(|e| e.as_aggregation())
    }

    // ── Adjacency ───────────────────────────────────────────

    /// Source and target of an existing edge, visible or not.
    pub fn edge_endpoints(&self, edge: EdgeRef) -> Option<(NodeRef, NodeRef)> {
        match edge {
            EdgeRef::Original(id) => self
                .graph
                .edge(id)
                .map(|e| (NodeRef::Original(e.source), NodeRef::Original(e.target))),
            EdgeRef::Aggregation(id) => self.edges.get(&id).map(|e| (e.source, e.target)),
        }
    }

    pub fn source(&self, edge: EdgeRef) -> Option<NodeRef> {
        self.edge_endpoints(edge).map(|(source, _)| source)
    }

    pub fn target(&self, edge: EdgeRef) -> Option<NodeRef> {
        self.edge_endpoints(edge).map(|(_, target)| target)
    }

    /// All edges at a node, visible or hidden. A self-loop appears once.
    fn all_edges_at(&self, node: NodeRef) -> Vec<EdgeRef> {
        let mut result: Vec<EdgeRef> = match node {
            NodeRef::Original(id) => self
                .graph
                .edges_at(id)
                .map(|e| EdgeRef::Original(e.id))
                .collect(),
            NodeRef::Aggregation(_) => Vec::new(),
        };
        if let Some(synthetic) = self.incident.get(&node) {
            result.extend(synthetic.iter().map(|id| EdgeRef::Aggregation(*id)));
        }
        result
    }

    /// Visible edges at a visible node; empty for hidden nodes.
    pub fn visible_edges_at(&self, node: NodeRef) -> Vec<EdgeRef> {
        if !self.is_node_visible(node) {
            return Vec::new();
        }
        self.all_edges_at(node)
            .into_iter()
            .filter(|e| self.is_edge_visible(*e))
            .collect()
    }

    pub fn edges_at(&self, node: NodeRef) -> Vec<EdgeRef> {
        self.visible_edges_at(node)
    }

    pub fn out_edges(&self, node: NodeRef) -> Vec<EdgeRef> {
        self.visible_edges_at(node)
            .into_iter()
            .filter(|e| self.source(*e) == Some(node))
            .collect()
    }

    pub fn in_edges(&self, node: NodeRef) -> Vec<EdgeRef> {
        self.visible_edges_at(node)
            .into_iter()
            .filter(|e| self.target(*e) == Some(node))
            .collect()
    }

    pub fn degree(&self, node: NodeRef) -> usize {
        self.visible_edges_at(node).len()
    }

    /// Visible nodes adjacent to `node`, without repetition.
    pub fn neighbors(&self, node: NodeRef) -> Vec<NodeRef> {
        let mut result = Vec::new();
        for edge in self.visible_edges_at(node) {
            if let Some((source, target)) = self.edge_endpoints(edge) {
                let other = if source == node { target } else { source };
                if !result.contains(&other) {
                    result.push(other);
                }
            }
        }
        result
    }

    /// Visible edges from `source` to `target`.
    pub fn edges_between(&self, source: NodeRef, target: NodeRef) -> Vec<EdgeRef> {
        self.out_edges(source)
            .into_iter()
            .filter(|e| self.target(*e) == Some(target))
            .collect()
    }

    /// The visible node showing `node`: the node itself, or the outermost
    /// aggregation node it is folded into.
    pub fn representative(&self, node: NodeRef) -> NodeRef {
        let mut current = node;
        while let Some(parent) = self.container.get(&current) {
            current = NodeRef::Aggregation(*parent);
        }
        current
    }

    // ── Item data ───────────────────────────────────────────

    pub fn aggregation_node(&self, id: AggregationNodeId) -> Option<&AggregationNode> {
        self.nodes.get(&id)
    }

    pub fn aggregation_edge(&self, id: AggregationEdgeId) -> Option<&AggregationEdge> {
        self.edges.get(&id)
    }

    pub fn node_layout(&self, node: NodeRef) -> Option<Rect> {
        match node {
            NodeRef::Original(id) => self.graph.node(id).map(|n| n.layout),
            NodeRef::Aggregation(id) => self.nodes.get(&id).map(|n| n.layout),
        }
    }

    pub fn node_style(&self, node: NodeRef) -> Option<&str> {
        match node {
            NodeRef::Original(id) => self.graph.node(id).and_then(|n| n.style.as_deref()),
            NodeRef::Aggregation(id) => self.nodes.get(&id).and_then(|n| n.style.as_deref()),
        }
    }

    pub fn edge_style(&self, edge: EdgeRef) -> Option<&str> {
        match edge {
            EdgeRef::Original(id) => self.graph.edge(id).and_then(|e| e.style.as_deref()),
            EdgeRef::Aggregation(id) => self.edges.get(&id).and_then(|e| e.style.as_deref()),
        }
    }

    pub fn node_tag(&self, node: NodeRef) -> Option<&Tag> {
        match node {
            NodeRef::Original(id) => self.graph.node(id).and_then(|n| n.tag.as_ref()),
            NodeRef::Aggregation(id) => self.nodes.get(&id).and_then(|n| n.tag.as_ref()),
        }
    }

    pub fn edge_tag(&self, edge: EdgeRef) -> Option<&Tag> {
        match edge {
            EdgeRef::Original(id) => self.graph.edge(id).and_then(|e| e.tag.as_ref()),
            EdgeRef::Aggregation(id) => self.edges.get(&id).and_then(|e| e.tag.as_ref()),
        }
    }

    fn owner_labels(&self, owner: LabelOwner) -> &[String] {
        let labels = match owner {
            LabelOwner::Node(NodeRef::Original(id)) => self.graph.node(id).map(|n| &n.labels),
            LabelOwner::Node(NodeRef::Aggregation(id)) => self.nodes.get(&id).map(|n| &n.labels),
            LabelOwner::Edge(EdgeRef::Original(id)) => self.graph.edge(id).map(|e| &e.labels),
            LabelOwner::Edge(EdgeRef::Aggregation(id)) => self.edges.get(&id).map(|e| &e.labels),
        };
        labels.map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_labels(&self, node: NodeRef) -> &[String] {
        self.owner_labels(LabelOwner::Node(node))
    }

    pub fn edge_labels(&self, edge: EdgeRef) -> &[String] {
        self.owner_labels(LabelOwner::Edge(edge))
    }

    pub fn label_text(&self, label: LabelRef) -> Option<&str> {
        self.owner_labels(label.owner)
            .get(label.index)
            .map(String::as_str)
    }

    pub fn edge_bends(&self, edge: EdgeRef) -> &[Point] {
        let bends = match edge {
            EdgeRef::Original(id) => self.graph.edge(id).map(|e| &e.bends),
            EdgeRef::Aggregation(id) => self.edges.get(&id).map(|e| &e.bends),
        };
        bends.map(Vec::as_slice).unwrap_or(&[])
    }

    /// Human readable name: first label, or the handle.
    pub fn display_name(&self, node: NodeRef) -> String {
        match self.node_labels(node).first() {
            Some(label) => label.clone(),
            None => match node {
                NodeRef::Original(id) => format!("n{}", id.0),
                NodeRef::Aggregation(id) => format!("agg{}", id.0),
            },
        }
    }
}
