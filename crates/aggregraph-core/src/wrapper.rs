//! The aggregate graph: an overlay over a [`Graph`] that folds node sets into
//! synthetic aggregation nodes and back.
//!
//! Membership is the only hidden state. A node is visible iff it exists and no
//! live aggregation node has it as a member; an edge is visible iff it exists
//! and both of its endpoints are visible. Hiding or showing a node therefore
//! touches a single map entry.
//!
//! Every edge that is replaced by a synthetic edge points to it through the
//! cover map. Walking that chain answers whether an original edge is still
//! represented in the visible graph.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::aggregation::{Crossing, PlannedEdge, ReplacementKey, plan_replacements};
use crate::config::{AggregateGraphConfig, EdgeReplacementPolicy};
use crate::error::{AggregateError, Result};
use crate::events::{ChangeBatch, EventQueue, GraphEvent, Listener, ListenerId};
use crate::graph::Graph;
use crate::model::*;

/// A synthetic node standing for a set of aggregated nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationNode {
    pub id: AggregationNodeId,
    pub layout: Rect,
    pub style: Option<String>,
    pub tag: Option<Tag>,
    pub labels: Vec<String>,
    /// Direct members, original or synthetic, in aggregation order.
    pub aggregated: Vec<NodeRef>,
}

/// A synthetic edge standing for the edges it replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationEdge {
    pub id: AggregationEdgeId,
    pub source: NodeRef,
    pub target: NodeRef,
    pub style: Option<String>,
    pub tag: Option<Tag>,
    pub labels: Vec<String>,
    pub bends: Vec<Point>,
    /// Replaced edges, original or synthetic, in encounter order.
    pub aggregated: Vec<EdgeRef>,
}

type NodeTagFactory = Box<dyn Fn(&[NodeRef]) -> Option<Tag>>;
type EdgeTagFactory = Box<dyn Fn(&[EdgeRef]) -> Option<Tag>>;

pub struct AggregateGraph {
    pub(crate) graph: Graph,
    pub(crate) config: AggregateGraphConfig,
    pub(crate) nodes: BTreeMap<AggregationNodeId, AggregationNode>,
    pub(crate) edges: BTreeMap<AggregationEdgeId, AggregationEdge>,
    /// member -> aggregation node it is folded into
    pub(crate) container: HashMap<NodeRef, AggregationNodeId>,
    /// replaced edge -> synthetic edge replacing it
    pub(crate) cover: HashMap<EdgeRef, AggregationEdgeId>,
    /// node -> synthetic edges at it, visible or not
    pub(crate) incident: HashMap<NodeRef, Vec<AggregationEdgeId>>,
    next_id: u64,
    events: EventQueue,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    node_tag_factory: Option<NodeTagFactory>,
    edge_tag_factory: Option<EdgeTagFactory>,
}

impl std::fmt::Debug for AggregateGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateGraph")
            .field("graph", &self.graph)
            .field("policy", &self.config.edge_replacement_policy)
            .field("aggregation_nodes", &self.nodes.len())
            .field("aggregation_edges", &self.edges.len())
            .field("hidden_nodes", &self.container.len())
            .finish()
    }
}

impl AggregateGraph {
    pub fn new(graph: Graph) -> Self {
        Self::with_config(graph, AggregateGraphConfig::default())
    }

    pub fn with_config(graph: Graph, config: AggregateGraphConfig) -> Self {
        AggregateGraph {
            graph,
            config,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            container: HashMap::new(),
            cover: HashMap::new(),
            incident: HashMap::new(),
            next_id: 0,
            events: EventQueue::new(),
            listeners: Vec::new(),
            next_listener: 0,
            node_tag_factory: None,
            edge_tag_factory: None,
        }
    }

    /// The wrapped graph, including hidden items.
    pub fn wrapped_graph(&self) -> &Graph {
        &self.graph
    }

    /// Separate everything and hand back the wrapped graph.
    pub fn into_wrapped_graph(mut self) -> Graph {
        self.separate_all();
        self.graph
    }

    pub fn config(&self) -> &AggregateGraphConfig {
        &self.config
    }

    pub fn edge_replacement_policy(&self) -> EdgeReplacementPolicy {
        self.config.edge_replacement_policy
    }

    /// Only later aggregate and separate calls see the new policy.
    pub fn set_edge_replacement_policy(&mut self, policy: EdgeReplacementPolicy) {
        self.config.edge_replacement_policy = policy;
    }

    pub fn set_node_tag_factory(&mut self, factory: impl Fn(&[NodeRef]) -> Option<Tag> + 'static) {
        self.node_tag_factory = Some(Box::new(factory));
    }

    pub fn set_edge_tag_factory(&mut self, factory: impl Fn(&[EdgeRef]) -> Option<Tag> + 'static) {
        self.edge_tag_factory = Some(Box::new(factory));
    }

    // ── Listeners ───────────────────────────────────────────

    /// Register a listener that receives every change batch.
    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeBatch) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Sequence number of the last delivered batch.
    pub fn sequence(&self) -> u64 {
        self.events.sequence()
    }

    fn flush(&mut self) {
        if let Some(batch) = self.events.take_batch() {
            tracing::trace!(
                sequence = batch.sequence,
                events = batch.events.len(),
                "delivering change batch"
            );
            for (_, listener) in self.listeners.iter_mut() {
                listener(&batch);
            }
        }
    }

    // ── Aggregate / separate ────────────────────────────────

    /// Fold `nodes` into a new aggregation node.
    ///
    /// The members may be original or aggregation nodes and must all be
    /// visible. Their visible edges to the rest of the graph are replaced
    /// according to the edge replacement policy; edges between members are
    /// hidden and come back on separation. Without a layout the node is
    /// centered on the members with the default size.
    pub fn aggregate(
        &mut self,
        nodes: &[NodeRef],
        layout: Option<Rect>,
        style: Option<String>,
        tag: Option<Tag>,
    ) -> Result<AggregationNodeId> {
        let mut members = HashSet::with_capacity(nodes.len());
        for node in nodes {
            if !self.is_node_visible(*node) {
                return Err(AggregateError::NodeNotInGraph(*node));
            }
            if !members.insert(*node) {
                return Err(AggregateError::DuplicateMember(*node));
            }
        }
        if let Some(layout) = layout {
            if !layout.is_finite() {
                return Err(AggregateError::non_finite("aggregation node layout"));
            }
        }

        let layout = match layout {
            Some(layout) => layout,
            None => self.default_layout(nodes),
        };

        // Adjacency has to be read while the members are still visible
        let mut crossings = Vec::new();
        let mut hidden_edges = Vec::new();
        let mut seen = HashSet::new();
        for member in nodes {
            for edge in self.visible_edges_at(*member) {
                if seen.insert(edge) {
                    hidden_edges.push(edge);
                }
                let Some((source, target)) = self.edge_endpoints(edge) else {
                    continue;
                };
                let (other, outgoing) = if source == *member {
                    (target, true)
                } else {
                    (source, false)
                };
                if members.contains(&other) {
                    continue;
                }
                crossings.push(Crossing {
                    edge,
                    other,
                    outgoing,
                });
            }
        }

        let id = AggregationNodeId(self.allocate_id());
        let node_ref = NodeRef::Aggregation(id);
        let tag = tag.or_else(|| self.node_tag_factory.as_ref().and_then(|f| f(nodes)));
        self.nodes.insert(
            id,
            AggregationNode {
                id,
                layout,
                style: style.or_else(|| self.config.node_defaults.style.clone()),
                tag,
                labels: self.config.node_defaults.label.iter().cloned().collect(),
                aggregated: nodes.to_vec(),
            },
        );
        self.events.push(GraphEvent::NodeCreated { node: node_ref });

        let plan = plan_replacements(self.config.edge_replacement_policy, node_ref, &crossings, |_| None);
        let replacement_count = plan.len();
        self.apply_plan(plan);

        for member in nodes {
            self.container.insert(*member, id);
        }
        for edge in hidden_edges.iter() {
            self.events.push(GraphEvent::EdgeRemoved { edge: *edge });
        }
        for member in nodes {
            self.events.push(GraphEvent::NodeRemoved { node: *member });
        }

        tracing::debug!(
            node = id.0,
            members = nodes.len(),
            crossing = crossings.len(),
            replacements = replacement_count,
            "aggregated nodes"
        );
        self.flush();
        Ok(id)
    }

    /// Dissolve a visible aggregation node and show its members again.
    ///
    /// The node and all synthetic edges at it are discarded. Edges of the
    /// members that lost their representation while the node existed get new
    /// synthetic edges to the nearest visible node, so members can be
    /// separated in any order.
    pub fn separate(&mut self, node: NodeRef) -> Result<()> {
        let id = self.check_separable(node)?;
        self.separate_inner(id);
        self.flush();
        Ok(())
    }

    /// Separate aggregation nodes until none is left. Calling it on a graph
    /// without aggregation nodes does nothing.
    pub fn separate_all(&mut self) {
        let mut separated = 0usize;
        while let Some(id) = self.first_visible_aggregation_node() {
            self.separate_inner(id);
            separated += 1;
        }
        if separated > 0 {
            tracing::debug!(separated, "separated all aggregation nodes");
        }
        self.flush();
    }

    fn first_visible_aggregation_node(&self) -> Option<AggregationNodeId> {
        self.nodes
            .keys()
            .copied()
            .find(|id| !self.container.contains_key(&NodeRef::Aggregation(*id)))
    }

    fn check_separable(&self, node: NodeRef) -> Result<AggregationNodeId> {
        if !self.is_node_visible(node) {
            return Err(AggregateError::NodeNotInGraph(node));
        }
        node.as_aggregation()
            .ok_or(AggregateError::NotAnAggregationNode(node))
    }

    fn separate_inner(&mut self, id: AggregationNodeId) {
        let node_ref = NodeRef::Aggregation(id);
        let removed_edges = self.visible_edges_at(node_ref);

        for edge in self.incident.remove(&node_ref).unwrap_or_default() {
            self.destroy_edge(edge);
        }
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        for member in &node.aggregated {
            self.container.remove(member);
        }

        for member in &node.aggregated {
            self.events.push(GraphEvent::NodeCreated { node: *member });
        }
        let mut seen = HashSet::new();
        for member in &node.aggregated {
            for edge in self.visible_edges_at(*member) {
                if seen.insert(edge) {
                    self.events.push(GraphEvent::EdgeCreated { edge });
                }
            }
        }
        let mut restored = 0usize;
        for member in &node.aggregated {
            restored += self.replace_missing_edges(*member);
        }
        for edge in removed_edges {
            self.events.push(GraphEvent::EdgeRemoved { edge });
        }
        self.events.push(GraphEvent::NodeRemoved { node: node_ref });

        tracing::debug!(
            node = id.0,
            members = node.aggregated.len(),
            revealed = seen.len(),
            restored,
            "separated aggregation node"
        );
    }

    /// Give every original edge represented by `node` that has no visible
    /// representation a synthetic edge to the nearest visible node showing
    /// its other endpoint. Returns the number of synthetic edges created.
    fn replace_missing_edges(&mut self, node: NodeRef) -> usize {
        let policy = self.config.edge_replacement_policy;
        if policy == EdgeReplacementPolicy::None {
            return 0;
        }

        let mut crossings = Vec::new();
        for original in self.original_nodes_of(node) {
            for edge in self.graph.edges_at(original) {
                let (other, outgoing) = if edge.source == original {
                    (edge.target, true)
                } else {
                    (edge.source, false)
                };
                let other = self.representative(NodeRef::Original(other));
                if other == node {
                    continue;
                }
                let edge_ref = EdgeRef::Original(edge.id);
                if self.visible_cover(edge_ref).is_some() {
                    continue;
                }
                crossings.push(Crossing {
                    edge: self.topmost_cover(edge_ref),
                    other,
                    outgoing,
                });
            }
        }
        if crossings.is_empty() {
            return 0;
        }

        let plan = plan_replacements(policy, node, &crossings, |key| {
            self.find_visible_replacement(node, key)
        });
        let created = plan.iter().filter(|p| p.existing.is_none()).count();
        self.apply_plan(plan);
        created
    }

    /// A visible synthetic edge between `node` and `key.other`, honoring direction.
    fn find_visible_replacement(&self, node: NodeRef, key: ReplacementKey) -> Option<AggregationEdgeId> {
        self.incident.get(&node)?.iter().copied().find(|id| {
            let Some(edge) = self.edges.get(id) else {
                return false;
            };
            if !self.is_edge_visible(EdgeRef::Aggregation(*id)) {
                return false;
            }
            match key.outgoing {
                Some(true) => edge.source == node && edge.target == key.other,
                Some(false) => edge.target == node && edge.source == key.other,
                None => {
                    (edge.source == node && edge.target == key.other)
                        || (edge.target == node && edge.source == key.other)
                }
            }
        })
    }

    fn apply_plan(&mut self, plan: Vec<PlannedEdge>) {
        for planned in plan {
            match planned.existing {
                Some(existing) => {
                    for replaced in &planned.replaced {
                        self.cover.insert(*replaced, existing);
                    }
                    if let Some(edge) = self.edges.get_mut(&existing) {
                        for replaced in planned.replaced {
                            if !edge.aggregated.contains(&replaced) {
                                edge.aggregated.push(replaced);
                            }
                        }
                    }
                    self.events.push(GraphEvent::EdgeChanged {
                        edge: EdgeRef::Aggregation(existing),
                    });
                }
                None => {
                    let tag = self
                        .edge_tag_factory
                        .as_ref()
                        .and_then(|f| f(&planned.replaced));
                    let id = self.insert_edge(planned.source, planned.target, planned.replaced, tag);
                    self.events.push(GraphEvent::EdgeCreated {
                        edge: EdgeRef::Aggregation(id),
                    });
                }
            }
        }
    }

    fn insert_edge(
        &mut self,
        source: NodeRef,
        target: NodeRef,
        aggregated: Vec<EdgeRef>,
        tag: Option<Tag>,
    ) -> AggregationEdgeId {
        let id = AggregationEdgeId(self.allocate_id());
        for replaced in &aggregated {
            self.cover.insert(*replaced, id);
        }
        self.incident.entry(source).or_default().push(id);
        if target != source {
            self.incident.entry(target).or_default().push(id);
        }
        self.edges.insert(
            id,
            AggregationEdge {
                id,
                source,
                target,
                style: self.config.edge_defaults.style.clone(),
                tag,
                labels: Vec::new(),
                bends: Vec::new(),
                aggregated,
            },
        );
        id
    }

    /// Drop a synthetic edge from every index. The edges it replaced lose
    /// their cover and become visible again if both endpoints are.
    fn destroy_edge(&mut self, id: AggregationEdgeId) -> Option<AggregationEdge> {
        let edge = self.edges.remove(&id)?;
        for end in [edge.source, edge.target] {
            if let Some(list) = self.incident.get_mut(&end) {
                list.retain(|e| *e != id);
                if list.is_empty() {
                    self.incident.remove(&end);
                }
            }
        }
        let this = EdgeRef::Aggregation(id);
        if let Some(parent) = self.cover.remove(&this) {
            if let Some(parent) = self.edges.get_mut(&parent) {
                parent.aggregated.retain(|e| *e != this);
            }
        }
        for replaced in &edge.aggregated {
            if self.cover.get(replaced) == Some(&id) {
                self.cover.remove(replaced);
            }
        }
        Some(edge)
    }

    /// Unhook an edge that is about to disappear from its cover. Covers that
    /// end up replacing nothing disappear too.
    fn detach_edge(&mut self, edge: EdgeRef) {
        let mut next = self.cover.remove(&edge).map(|parent| (parent, edge));
        while let Some((parent, child)) = next.take() {
            let Some(cover) = self.edges.get_mut(&parent) else {
                break;
            };
            cover.aggregated.retain(|e| *e != child);
            if !cover.aggregated.is_empty() {
                break;
            }
            let parent_ref = EdgeRef::Aggregation(parent);
            if self.is_edge_visible(parent_ref) {
                self.events.push(GraphEvent::EdgeRemoved { edge: parent_ref });
            }
            let grand = self.cover.get(&parent_ref).copied();
            self.destroy_edge(parent);
            next = grand.map(|grand| (grand, parent_ref));
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn default_layout(&self, nodes: &[NodeRef]) -> Rect {
        let bounds = nodes
            .iter()
            .filter_map(|n| self.node_layout(*n))
            .reduce(|a, b| a.union(&b));
        let center = bounds.map(|b| b.center()).unwrap_or(Point::ORIGIN);
        Rect::from_center(center, self.config.node_defaults.size)
    }

    // ── Cover chains ────────────────────────────────────────

    /// The first visible edge along the cover chain of `edge`, starting with `edge`.
    pub(crate) fn visible_cover(&self, edge: EdgeRef) -> Option<EdgeRef> {
        let mut current = Some(edge);
        while let Some(e) = current {
            if self.is_edge_visible(e) {
                return Some(e);
            }
            current = self.cover.get(&e).map(|id| EdgeRef::Aggregation(*id));
        }
        None
    }

    /// The last live edge along the cover chain of `edge`.
    pub(crate) fn topmost_cover(&self, edge: EdgeRef) -> EdgeRef {
        let mut current = edge;
        while let Some(parent) = self.cover.get(&current) {
            current = EdgeRef::Aggregation(*parent);
        }
        current
    }

    /// All original nodes folded into `node`, or `node` itself when original.
    pub(crate) fn original_nodes_of(&self, node: NodeRef) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current {
                NodeRef::Original(id) => result.push(id),
                NodeRef::Aggregation(id) => {
                    if let Some(agg) = self.nodes.get(&id) {
                        stack.extend(agg.aggregated.iter().rev());
                    }
                }
            }
        }
        result
    }

    // ── Queries on aggregation items ────────────────────────

    pub fn is_aggregation_item(&self, item: Item) -> bool {
        item.is_aggregation_item()
    }

    /// The items directly folded into an aggregation node or replaced by an
    /// aggregation edge. Empty for every other item.
    pub fn aggregated_items(&self, item: Item) -> Vec<Item> {
        match item {
            Item::Node(NodeRef::Aggregation(id)) => self
                .nodes
                .get(&id)
                .map(|n| n.aggregated.iter().map(|m| Item::Node(*m)).collect())
                .unwrap_or_default(),
            Item::Edge(EdgeRef::Aggregation(id)) => self
                .edges
                .get(&id)
                .map(|e| e.aggregated.iter().map(|a| Item::Edge(*a)).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Like [`aggregated_items`](Self::aggregated_items) but recursive and
    /// restricted to original items.
    pub fn all_aggregated_original_items(&self, item: Item) -> Vec<Item> {
        match item {
            Item::Node(node @ NodeRef::Aggregation(_)) => self
                .original_nodes_of(node)
                .into_iter()
                .map(|id| Item::Node(NodeRef::Original(id)))
                .collect(),
            Item::Edge(EdgeRef::Aggregation(id)) => {
                let mut result = Vec::new();
                let mut stack = vec![id];
                while let Some(current) = stack.pop() {
                    let Some(edge) = self.edges.get(&current) else {
                        continue;
                    };
                    for replaced in edge.aggregated.iter().rev() {
                        match replaced {
                            EdgeRef::Original(_) => result.push(Item::Edge(*replaced)),
                            EdgeRef::Aggregation(inner) => stack.push(*inner),
                        }
                    }
                }
                result
            }
            _ => Vec::new(),
        }
    }

    /// The aggregation node a node is directly folded into.
    pub fn parent_aggregation(&self, node: NodeRef) -> Option<AggregationNodeId> {
        self.container.get(&node).copied()
    }

    // ── Pass-through mutation ───────────────────────────────

    /// Create an original node in the wrapped graph.
    pub fn create_node(&mut self, node: GraphNode) -> Result<NodeRef> {
        if let Some(parent) = node.parent {
            self.check_visible_node(NodeRef::Original(parent))?;
        }
        let id = self.graph.add_node(node)?;
        let node = NodeRef::Original(id);
        self.events.push(GraphEvent::NodeCreated { node });
        self.flush();
        Ok(node)
    }

    /// Connect two visible nodes. Between original nodes this creates an
    /// original edge; at an aggregation node it creates a synthetic edge that
    /// replaces nothing and disappears with its endpoint.
    pub fn create_edge(&mut self, source: NodeRef, target: NodeRef) -> Result<EdgeRef> {
        self.check_visible_node(source)?;
        self.check_visible_node(target)?;
        let edge = match (source, target) {
            (NodeRef::Original(s), NodeRef::Original(t)) => {
                EdgeRef::Original(self.graph.add_edge(GraphEdge::between(s, t))?)
            }
            _ => EdgeRef::Aggregation(self.insert_edge(source, target, Vec::new(), None)),
        };
        self.events.push(GraphEvent::EdgeCreated { edge });
        self.flush();
        Ok(edge)
    }

    /// Remove a visible node. An aggregation node takes everything it
    /// aggregates with it, including original items of the wrapped graph.
    pub fn remove_node(&mut self, node: NodeRef) -> Result<()> {
        self.check_visible_node(node)?;
        for edge in self.visible_edges_at(node) {
            self.events.push(GraphEvent::EdgeRemoved { edge });
        }
        self.events.push(GraphEvent::NodeRemoved { node });

        let mut subtree = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            subtree.push(current);
            if let NodeRef::Aggregation(id) = current {
                if let Some(agg) = self.nodes.get(&id) {
                    stack.extend(agg.aggregated.iter().copied());
                }
            }
        }
        for current in &subtree {
            for edge in self.incident.remove(current).unwrap_or_default() {
                self.destroy_edge(edge);
            }
        }
        for current in &subtree {
            self.container.remove(current);
            match current {
                NodeRef::Aggregation(id) => {
                    self.nodes.remove(id);
                }
                NodeRef::Original(id) => {
                    let edges: Vec<EdgeId> = self.graph.edges_at(*id).map(|e| e.id).collect();
                    for edge in edges {
                        self.detach_edge(EdgeRef::Original(edge));
                    }
                    self.graph.remove_node(*id);
                }
            }
        }
        tracing::debug!(?node, removed = subtree.len(), "removed node");
        self.flush();
        Ok(())
    }

    /// Remove a visible edge. An aggregation edge takes every edge it
    /// replaces with it, recursively.
    pub fn remove_edge(&mut self, edge: EdgeRef) -> Result<()> {
        self.check_visible_edge(edge)?;
        self.events.push(GraphEvent::EdgeRemoved { edge });
        self.remove_edge_inner(edge);
        self.flush();
        Ok(())
    }

    fn remove_edge_inner(&mut self, edge: EdgeRef) {
        match edge {
            EdgeRef::Original(id) => {
                self.detach_edge(edge);
                self.graph.remove_edge(id);
            }
            EdgeRef::Aggregation(id) => {
                self.detach_edge(edge);
                if let Some(removed) = self.destroy_edge(id) {
                    for replaced in removed.aggregated {
                        self.remove_edge_inner(replaced);
                    }
                }
            }
        }
    }

    /// Move or resize a visible node of either kind.
    pub fn set_node_layout(&mut self, node: NodeRef, layout: Rect) -> Result<()> {
        self.check_visible_node(node)?;
        match node {
            NodeRef::Original(id) => self.graph.set_layout(id, layout)?,
            NodeRef::Aggregation(id) => {
                if !layout.is_finite() {
                    return Err(AggregateError::non_finite("aggregation node layout"));
                }
                if let Some(agg) = self.nodes.get_mut(&id) {
                    agg.layout = layout;
                }
            }
        }
        self.events.push(GraphEvent::NodeChanged { node });
        self.flush();
        Ok(())
    }

    /// Reshape a node of the wrapped graph. Aggregation nodes are rejected
    /// with NotSupported.
    pub fn set_original_node_layout(&mut self, node: NodeRef, layout: Rect) -> Result<()> {
        self.check_visible_node(node)?;
        if node.is_aggregation() {
            return Err(AggregateError::AggregationItemNotSupported {
                operation: "set_original_node_layout",
            });
        }
        self.set_node_layout(node, layout)
    }

    /// Reconnect an original edge to other original ports.
    pub fn set_edge_ports(&mut self, edge: EdgeRef, source: PortRef, target: PortRef) -> Result<()> {
        self.check_visible_edge(edge)?;
        self.check_visible_node(source.owner())?;
        self.check_visible_node(target.owner())?;
        let EdgeRef::Original(id) = edge else {
            return Err(AggregateError::SyntheticEdge(edge));
        };
        let (NodeRef::Original(s), NodeRef::Original(t)) = (source.owner(), target.owner()) else {
            let synthetic = if source.owner().is_aggregation() {
                source.owner()
            } else {
                target.owner()
            };
            return Err(AggregateError::SyntheticPort(synthetic));
        };
        self.graph.set_edge_endpoints(id, s, t)?;
        self.events.push(GraphEvent::EdgeChanged { edge });
        self.flush();
        Ok(())
    }

    /// Move an original node into a group node of the wrapped graph.
    pub fn set_group_parent(&mut self, node: NodeRef, parent: Option<NodeRef>) -> Result<()> {
        self.check_visible_node(node)?;
        if let Some(parent) = parent {
            self.check_visible_node(parent)?;
        }
        let (NodeRef::Original(id), None | Some(NodeRef::Original(_))) = (node, parent) else {
            return Err(AggregateError::AggregationItemNotSupported {
                operation: "set_group_parent",
            });
        };
        self.graph.set_parent(id, parent.and_then(|p| p.as_original()))?;
        self.events.push(GraphEvent::NodeChanged { node });
        self.flush();
        Ok(())
    }

    pub fn set_is_group(&mut self, node: NodeRef, is_group: bool) -> Result<()> {
        self.check_visible_node(node)?;
        let NodeRef::Original(id) = node else {
            return Err(AggregateError::AggregationItemNotSupported {
                operation: "set_is_group",
            });
        };
        self.graph.set_is_group(id, is_group)?;
        self.events.push(GraphEvent::NodeChanged { node });
        self.flush();
        Ok(())
    }

    pub fn set_node_style(&mut self, node: NodeRef, style: Option<String>) -> Result<()> {
        self.check_visible_node(node)?;
        match node {
            NodeRef::Original(id) => {
                if let Some(n) = self.graph.node_mut(id) {
                    n.style = style;
                }
            }
            NodeRef::Aggregation(id) => {
                if let Some(n) = self.nodes.get_mut(&id) {
                    n.style = style;
                }
            }
        }
        self.events.push(GraphEvent::NodeChanged { node });
        self.flush();
        Ok(())
    }

    pub fn set_edge_style(&mut self, edge: EdgeRef, style: Option<String>) -> Result<()> {
        self.check_visible_edge(edge)?;
        match edge {
            EdgeRef::Original(id) => {
                if let Some(e) = self.graph.edge_mut(id) {
                    e.style = style;
                }
            }
            EdgeRef::Aggregation(id) => {
                if let Some(e) = self.edges.get_mut(&id) {
                    e.style = style;
                }
            }
        }
        self.events.push(GraphEvent::EdgeChanged { edge });
        self.flush();
        Ok(())
    }

    /// Replace the tag of a node. Hidden nodes can be tagged as well.
    pub fn set_node_tag(&mut self, node: NodeRef, tag: Option<Tag>) -> Result<()> {
        match node {
            NodeRef::Original(id) => {
                let n = self
                    .graph
                    .node_mut(id)
                    .ok_or(AggregateError::NodeNotInGraph(node))?;
                n.tag = tag;
            }
            NodeRef::Aggregation(id) => {
                let n = self
                    .nodes
                    .get_mut(&id)
                    .ok_or(AggregateError::NodeNotInGraph(node))?;
                n.tag = tag;
            }
        }
        if self.is_node_visible(node) {
            self.events.push(GraphEvent::NodeChanged { node });
            self.flush();
        }
        Ok(())
    }

    pub fn set_edge_tag(&mut self, edge: EdgeRef, tag: Option<Tag>) -> Result<()> {
        match edge {
            EdgeRef::Original(id) => {
                let e = self
                    .graph
                    .edge_mut(id)
                    .ok_or(AggregateError::EdgeNotInGraph(edge))?;
                e.tag = tag;
            }
            EdgeRef::Aggregation(id) => {
                let e = self
                    .edges
                    .get_mut(&id)
                    .ok_or(AggregateError::EdgeNotInGraph(edge))?;
                e.tag = tag;
            }
        }
        if self.is_edge_visible(edge) {
            self.events.push(GraphEvent::EdgeChanged { edge });
            self.flush();
        }
        Ok(())
    }

    pub fn add_label(&mut self, owner: LabelOwner, text: impl Into<String>) -> Result<LabelRef> {
        self.check_visible_owner(owner)?;
        let labels = self
            .labels_mut(owner)
            .ok_or(AggregateError::LabelNotInGraph(LabelRef { owner, index: 0 }))?;
        labels.push(text.into());
        let label = LabelRef {
            owner,
            index: labels.len() - 1,
        };
        self.events.push(GraphEvent::LabelAdded { label });
        self.flush();
        Ok(label)
    }

    /// Remove a label. Later labels of the same owner move up by one.
    pub fn remove_label(&mut self, label: LabelRef) -> Result<()> {
        self.check_visible_label(label)?;
        if let Some(labels) = self.labels_mut(label.owner) {
            labels.remove(label.index);
        }
        self.events.push(GraphEvent::LabelRemoved { label });
        self.flush();
        Ok(())
    }

    pub fn set_label_text(&mut self, label: LabelRef, text: impl Into<String>) -> Result<()> {
        self.check_visible_label(label)?;
        if let Some(slot) = self
            .labels_mut(label.owner)
            .and_then(|labels| labels.get_mut(label.index))
        {
            *slot = text.into();
        }
        self.events.push(GraphEvent::LabelChanged { label });
        self.flush();
        Ok(())
    }

    pub fn add_bend(&mut self, edge: EdgeRef, location: Point) -> Result<BendRef> {
        self.check_visible_edge(edge)?;
        if !location.is_finite() {
            return Err(AggregateError::non_finite("bend location"));
        }
        let bends = self
            .bends_mut(edge)
            .ok_or(AggregateError::EdgeNotInGraph(edge))?;
        bends.push(location);
        let bend = BendRef {
            edge,
            index: bends.len() - 1,
        };
        self.events.push(GraphEvent::BendAdded { bend });
        self.flush();
        Ok(bend)
    }

    pub fn remove_bend(&mut self, bend: BendRef) -> Result<()> {
        if !self.contains(Item::Bend(bend)) {
            return Err(AggregateError::BendNotInGraph(bend));
        }
        if let Some(bends) = self.bends_mut(bend.edge) {
            bends.remove(bend.index);
        }
        self.events.push(GraphEvent::BendRemoved { bend });
        self.flush();
        Ok(())
    }

    fn labels_mut(&mut self, owner: LabelOwner) -> Option<&mut Vec<String>> {
        match owner {
            LabelOwner::Node(NodeRef::Original(id)) => self.graph.node_mut(id).map(|n| &mut n.labels),
            LabelOwner::Node(NodeRef::Aggregation(id)) => self.nodes.get_mut(&id).map(|n| &mut n.labels),
            LabelOwner::Edge(EdgeRef::Original(id)) => self.graph.edge_mut(id).map(|e| &mut e.labels),
            LabelOwner::Edge(EdgeRef::Aggregation(id)) => self.edges.get_mut(&id).map(|e| &mut e.labels),
        }
    }

    fn bends_mut(&mut self, edge: EdgeRef) -> Option<&mut Vec<Point>> {
        match edge {
            EdgeRef::Original(id) => self.graph.edge_mut(id).map(|e| &mut e.bends),
            EdgeRef::Aggregation(id) => self.edges.get_mut(&id).map(|e| &mut e.bends),
        }
    }

    // ── Validation ──────────────────────────────────────────

    fn check_visible_node(&self, node: NodeRef) -> Result<()> {
        if self.is_node_visible(node) {
            Ok(())
        } else {
            Err(AggregateError::NodeNotInGraph(node))
        }
    }

    fn check_visible_edge(&self, edge: EdgeRef) -> Result<()> {
        if self.is_edge_visible(edge) {
            Ok(())
        } else {
            Err(AggregateError::EdgeNotInGraph(edge))
        }
    }

    fn check_visible_owner(&self, owner: LabelOwner) -> Result<()> {
        match owner {
            LabelOwner::Node(node) => self.check_visible_node(node),
            LabelOwner::Edge(edge) => self.check_visible_edge(edge),
        }
    }

    fn check_visible_label(&self, label: LabelRef) -> Result<()> {
        if self.contains(Item::Label(label)) {
            Ok(())
        } else {
            Err(AggregateError::LabelNotInGraph(label))
        }
    }

    /// Verify the structural invariants. Meant for tests and debugging.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for (member, parent) in &self.container {
            let agg = self
                .nodes
                .get(parent)
                .ok_or_else(|| format!("{member:?} is folded into missing {parent:?}"))?;
            if !agg.aggregated.contains(member) {
                return Err(format!("{parent:?} does not list member {member:?}"));
            }
            if !self.node_exists(*member) {
                return Err(format!("hidden node {member:?} does not exist"));
            }
        }
        for (id, agg) in &self.nodes {
            for member in &agg.aggregated {
                if self.container.get(member) != Some(id) {
                    return Err(format!("member {member:?} of {id:?} is not hidden by it"));
                }
            }
            // Membership chains end in a visible node
            let mut seen = HashSet::new();
            let mut current = NodeRef::Aggregation(*id);
            while let Some(parent) = self.container.get(&current) {
                if !seen.insert(*parent) {
                    return Err(format!("aggregation cycle through {parent:?}"));
                }
                current = NodeRef::Aggregation(*parent);
            }
        }
        for (edge, parent) in &self.cover {
            let cover = self
                .edges
                .get(parent)
                .ok_or_else(|| format!("{edge:?} is covered by missing {parent:?}"))?;
            if !cover.aggregated.contains(edge) {
                return Err(format!("{parent:?} does not list replaced {edge:?}"));
            }
        }
        for (id, edge) in &self.edges {
            for end in [edge.source, edge.target] {
                if !self.node_exists(end) {
                    return Err(format!("{id:?} ends at missing node {end:?}"));
                }
                if !self.incident.get(&end).is_some_and(|list| list.contains(id)) {
                    return Err(format!("{id:?} missing from incidence of {end:?}"));
                }
            }
        }
        // Edges created with create_edge replace nothing and may repeat
        let undirected = self.config.edge_replacement_policy != EdgeReplacementPolicy::Directed;
        let mut pairs = HashSet::new();
        for (id, edge) in &self.edges {
            let edge_ref = EdgeRef::Aggregation(*id);
            if edge.aggregated.is_empty() || !self.is_edge_visible(edge_ref) {
                continue;
            }
            let Some((source, target)) = self.edge_endpoints(edge_ref) else {
                continue;
            };
            let key = if undirected && target < source {
                (target, source)
            } else {
                (source, target)
            };
            if !pairs.insert(key) {
                return Err(format!("duplicate synthetic edge between {source:?} and {target:?}"));
            }
        }
        Ok(())
    }
}
