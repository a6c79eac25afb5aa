//! Core data structures: item identities, geometry and original graph items

use serde::{Deserialize, Serialize};

/// Free-form user data attached to an item.
pub type Tag = serde_json::Value;

/// Identifier of an original node, assigned by the wrapped [`Graph`](crate::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

/// Identifier of an original edge, assigned by the wrapped [`Graph`](crate::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct EdgeId(pub u64);

/// Handle of a synthetic node. Handles come from a counter that never goes back,
/// so a stale handle never refers to a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregationNodeId(pub u64);

/// Handle of a synthetic edge. Same allocation rules as [`AggregationNodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregationEdgeId(pub u64);

/// A node of the aggregate graph: either an original node or a synthetic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    Original(NodeId),
    Aggregation(AggregationNodeId),
}

impl NodeRef {
    pub fn is_aggregation(&self) -> bool {
        matches!(self, NodeRef::Aggregation(_))
    }

    pub fn as_original(&self) -> Option<NodeId> {
        match self {
            NodeRef::Original(id) => Some(*id),
            NodeRef::Aggregation(_) => None,
        }
    }

    pub fn as_aggregation(&self) -> Option<AggregationNodeId> {
        match self {
            NodeRef::Original(_) => None,
            NodeRef::Aggregation(id) => Some(*id),
        }
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef::Original(id)
    }
}

impl From<AggregationNodeId> for NodeRef {
    fn from(id: AggregationNodeId) -> Self {
        NodeRef::Aggregation(id)
    }
}

/// An edge of the aggregate graph: either an original edge or a synthetic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EdgeRef {
    Original(EdgeId),
    Aggregation(AggregationEdgeId),
}

impl EdgeRef {
    pub fn is_aggregation(&self) -> bool {
        matches!(self, EdgeRef::Aggregation(_))
    }

    pub fn as_original(&self) -> Option<EdgeId> {
        match self {
            EdgeRef::Original(id) => Some(*id),
            EdgeRef::Aggregation(_) => None,
        }
    }

    pub fn as_aggregation(&self) -> Option<AggregationEdgeId> {
        match self {
            EdgeRef::Original(_) => None,
            EdgeRef::Aggregation(id) => Some(*id),
        }
    }
}

impl From<EdgeId> for EdgeRef {
    fn from(id: EdgeId) -> Self {
        EdgeRef::Original(id)
    }
}

impl From<AggregationEdgeId> for EdgeRef {
    fn from(id: AggregationEdgeId) -> Self {
        EdgeRef::Aggregation(id)
    }
}

/// The single port every node exposes. Edges attach to ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef(pub NodeRef);

impl PortRef {
    pub fn owner(&self) -> NodeRef {
        self.0
    }
}

/// Item that carries labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "owner", content = "ref", rename_all = "snake_case")]
pub enum LabelOwner {
    Node(NodeRef),
    Edge(EdgeRef),
}

/// A label, addressed by its owner and its position in the owner's label list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelRef {
    pub owner: LabelOwner,
    pub index: usize,
}

/// A bend, addressed by its edge and its position along the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BendRef {
    pub edge: EdgeRef,
    pub index: usize,
}

/// Any item of the aggregate graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum Item {
    Node(NodeRef),
    Edge(EdgeRef),
    Port(PortRef),
    Label(LabelRef),
    Bend(BendRef),
}

impl Item {
    /// Whether the item was created by the aggregate graph rather than the wrapped graph.
    pub fn is_aggregation_item(&self) -> bool {
        match self {
            Item::Node(node) => node.is_aggregation(),
            Item::Edge(edge) => edge.is_aggregation(),
            Item::Port(port) => port.owner().is_aggregation(),
            Item::Label(label) => match label.owner {
                LabelOwner::Node(node) => node.is_aggregation(),
                LabelOwner::Edge(edge) => edge.is_aggregation(),
            },
            Item::Bend(bend) => bend.edge.is_aggregation(),
        }
    }
}

impl From<NodeRef> for Item {
    fn from(node: NodeRef) -> Self {
        Item::Node(node)
    }
}

impl From<EdgeRef> for Item {
    fn from(edge: EdgeRef) -> Self {
        Item::Edge(edge)
    }
}

// ── Geometry ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }
}

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn from_center(center: Point, size: Size) -> Self {
        Rect {
            x: center.x - size.width / 2.0,
            y: center.y - size.height / 2.0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Smallest rectangle containing both rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let max_x = (self.x + self.width).max(other.x + other.width);
        let max_y = (self.y + self.height).max(other.y + other.height);
        Rect::new(x, y, max_x - x, max_y - y)
    }

    /// NaN or infinite coordinates make a layout unusable.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

// ── Original items ──────────────────────────────────────────

/// A node of the wrapped graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphNode {
    pub id: NodeId,
    pub layout: Rect,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
    /// Group nodes may have children.
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub parent: Option<NodeId>,
}

impl GraphNode {
    /// A plain node with the given layout and a single label.
    pub fn labeled(label: impl Into<String>, layout: Rect) -> Self {
        GraphNode {
            layout,
            labels: vec![label.into()],
            ..Default::default()
        }
    }
}

/// A directed edge of the wrapped graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub bends: Vec<Point>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub tag: Option<Tag>,
}

impl GraphEdge {
    pub fn between(source: NodeId, target: NodeId) -> Self {
        GraphEdge {
            source,
            target,
            ..Default::default()
        }
    }
}
