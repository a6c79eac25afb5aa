//! Aggregraph Core: aggregate graph overlay, edge replacement and aggregate hierarchies

pub mod model;
pub mod graph;
pub mod error;
pub mod config;
pub mod events;
pub mod aggregation;
pub mod wrapper;
pub mod view;
pub mod hierarchy;
pub mod helper;


#[cfg(test)]
pub mod test_utils;

pub use model::{
    AggregationEdgeId, AggregationNodeId, BendRef, EdgeId, EdgeRef, GraphEdge, GraphNode, Item,
    LabelOwner, LabelRef, NodeId, NodeRef, Point, PortRef, Rect, Size, Tag,
};
pub use graph::Graph;
pub use error::{AggregateError, ErrorKind, Result};
pub use config::{AggregateGraphConfig, AggregationEdgeDefaults, AggregationNodeDefaults, EdgeReplacementPolicy};
pub use events::{ChangeBatch, GraphEvent, ListenerId};
pub use aggregation::{Crossing, PlannedEdge, ReplacementKey, plan_replacements};
pub use wrapper::{AggregateGraph, AggregationEdge, AggregationNode};
pub use hierarchy::{Aggregate, AggregateHierarchy, AggregateHierarchyBuilder, AggregateId};
pub use helper::{AggregationHelper, AggregationNodeInfo};
