//! Wrapped graph using petgraph::StableDiGraph with custom NodeId/EdgeId

use crate::error::{AggregateError, Result};
use crate::model::*;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};

/// The original graph, a directed multigraph with stable node/edge indices.
///
/// An [`AggregateGraph`](crate::AggregateGraph) wraps one of these and never
/// changes its items except on explicit pass-through calls.
#[derive(Clone)]
pub struct Graph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

fn node_index(id: NodeId) -> NodeIndex {
    NodeIndex::new(id.0 as usize)
}

fn edge_index(id: EdgeId) -> EdgeIndex {
    EdgeIndex::new(id.0 as usize)
}

fn not_found(id: NodeId) -> AggregateError {
    AggregateError::NodeNotInGraph(NodeRef::Original(id))
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
        }
    }

    /// Add a node to graph. Returns assigned NodeId.
    pub fn add_node(&mut self, mut node: GraphNode) -> Result<NodeId> {
        if !node.layout.is_finite() {
            return Err(AggregateError::non_finite("node layout"));
        }
        if let Some(parent) = node.parent {
            self.check_group(parent)?;
        }
        let idx = self.inner.add_node(GraphNode::default());
        let id = NodeId(idx.index() as u64);
        node.id = id;
        self.inner[idx] = node;
        Ok(id)
    }

    /// Add an edge to graph. Returns assigned EdgeId.
    pub fn add_edge(&mut self, mut edge: GraphEdge) -> Result<EdgeId> {
        if !self.contains_node(edge.source) {
            return Err(not_found(edge.source));
        }
        if !self.contains_node(edge.target) {
            return Err(not_found(edge.target));
        }
        if edge.bends.iter().any(|b| !b.is_finite()) {
            return Err(AggregateError::non_finite("edge bend"));
        }
        let idx = self
            .inner
            .add_edge(node_index(edge.source), node_index(edge.target), GraphEdge::default());
        let id = EdgeId(idx.index() as u64);
        edge.id = id;
        self.inner[idx] = edge;
        Ok(id)
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.inner.node_weight(node_index(id))
    }

    /// Get a mutable node by ID.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.inner.node_weight_mut(node_index(id))
    }

    /// Get an edge by ID.
    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.inner.edge_weight(edge_index(id))
    }

    /// Get a mutable edge by ID.
    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut GraphEdge> {
        self.inner.edge_weight_mut(edge_index(id))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.inner.contains_node(node_index(id))
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.inner.edge_weight(edge_index(id)).is_some()
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes.
    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges.
    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.node_indices().map(|idx| NodeId(idx.index() as u64))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.inner.edge_indices().map(|idx| EdgeId(idx.index() as u64))
    }

    /// Get all outgoing edges from a node.
    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = &GraphEdge> {
        self.inner
            .edges_directed(node_index(source), Direction::Outgoing)
            .map(|edge_ref| edge_ref.weight())
    }

    /// Get all incoming edges to a node.
    pub fn edges_to(&self, target: NodeId) -> impl Iterator<Item = &GraphEdge> {
        self.inner
            .edges_directed(node_index(target), Direction::Incoming)
            .map(|edge_ref| edge_ref.weight())
    }

    /// Outgoing then incoming edges of a node. A self-loop is reported once.
    pub fn edges_at(&self, node: NodeId) -> impl Iterator<Item = &GraphEdge> {
        self.edges_from(node)
            .chain(self.edges_to(node).filter(move |e| e.source != node))
    }

    /// Find a node by its first label (first match).
    pub fn find_node_by_label(&self, label: &str) -> Option<NodeId> {
        self.all_nodes()
            .find(|n| n.labels.first().is_some_and(|l| l == label))
            .map(|n| n.id)
    }

    pub fn set_layout(&mut self, id: NodeId, layout: Rect) -> Result<()> {
        if !layout.is_finite() {
            return Err(AggregateError::non_finite("node layout"));
        }
        let node = self.node_mut(id).ok_or_else(|| not_found(id))?;
        node.layout = layout;
        Ok(())
    }

    /// Reconnect an edge. The edge keeps its id and its data.
    pub fn set_edge_endpoints(&mut self, id: EdgeId, source: NodeId, target: NodeId) -> Result<()> {
        if !self.contains_edge(id) {
            return Err(AggregateError::EdgeNotInGraph(EdgeRef::Original(id)));
        }
        if !self.contains_node(source) {
            return Err(not_found(source));
        }
        if !self.contains_node(target) {
            return Err(not_found(target));
        }
        let Some(mut edge) = self.inner.remove_edge(edge_index(id)) else {
            return Err(AggregateError::EdgeNotInGraph(EdgeRef::Original(id)));
        };
        edge.source = source;
        edge.target = target;
        // The freed slot is the head of petgraph's free list, so the id is reused.
        let idx = self.inner.add_edge(node_index(source), node_index(target), edge);
        debug_assert_eq!(idx.index() as u64, id.0);
        Ok(())
    }

    /// Remove a node and all its edges. Children of a removed group become top-level.
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        let removed = self.inner.remove_node(node_index(id))?;
        for node in self.inner.node_weights_mut() {
            if node.parent == Some(id) {
                node.parent = None;
            }
        }
        Some(removed)
    }

    /// Remove an edge by ID.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<GraphEdge> {
        self.inner.remove_edge(edge_index(id))
    }

    // ── Grouping ────────────────────────────────────────────

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.all_nodes()
            .filter(move |n| n.parent == Some(id))
            .map(|n| n.id)
    }

    pub fn is_group(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.is_group)
    }

    /// Turn a node into a group node or back. A node with children must stay a group.
    pub fn set_is_group(&mut self, id: NodeId, is_group: bool) -> Result<()> {
        if !self.contains_node(id) {
            return Err(not_found(id));
        }
        if !is_group && self.children(id).next().is_some() {
            return Err(AggregateError::GroupHasChildren(NodeRef::Original(id)));
        }
        if let Some(node) = self.node_mut(id) {
            node.is_group = is_group;
        }
        Ok(())
    }

    /// Move a node into a group node, or to the top level with `None`.
    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<()> {
        if !self.contains_node(id) {
            return Err(not_found(id));
        }
        if let Some(parent) = parent {
            self.check_group(parent)?;
            if self.ancestors(parent).contains(&id) || parent == id {
                return Err(AggregateError::GroupingCycle {
                    child: NodeRef::Original(id),
                    parent: NodeRef::Original(parent),
                });
            }
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = parent;
        }
        Ok(())
    }

    /// Get all group ancestors of a given node, innermost first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if ancestors.contains(&parent) {
                break;
            }
            ancestors.push(parent);
            current = self.parent(parent);
        }
        ancestors
    }

    fn check_group(&self, id: NodeId) -> Result<()> {
        if !self.contains_node(id) {
            return Err(not_found(id));
        }
        if !self.is_group(id) {
            return Err(AggregateError::NotAGroupNode(NodeRef::Original(id)));
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
