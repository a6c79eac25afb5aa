//! Error types for the aggregate graph

use thiserror::Error;

use crate::model::{BendRef, EdgeRef, LabelRef, NodeRef};

/// Result type alias using AggregateError
pub type Result<T> = std::result::Result<T, AggregateError>;

/// Coarse classification of an [`AggregateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The argument does not denote a usable item (absent, hidden, malformed).
    InvalidArgument,
    /// The item exists but the operation is not valid for it in its current state.
    InvalidOperation,
    /// The operation is not available for this kind of item.
    NotSupported,
}

/// Errors raised by the aggregate graph. All of them are detected before
/// any state is changed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregateError {
    #[error("node {0:?} is not in the graph")]
    NodeNotInGraph(NodeRef),

    #[error("edge {0:?} is not in the graph")]
    EdgeNotInGraph(EdgeRef),

    #[error("label {0:?} is not in the graph")]
    LabelNotInGraph(LabelRef),

    #[error("bend {0:?} is not in the graph")]
    BendNotInGraph(BendRef),

    #[error("node {0:?} was passed more than once")]
    DuplicateMember(NodeRef),

    #[error("geometry must be finite: {0}")]
    NonFiniteGeometry(String),

    #[error("node {0:?} is not an aggregation node")]
    NotAnAggregationNode(NodeRef),

    #[error("edges cannot be reconnected to or from aggregation port {0:?}")]
    SyntheticPort(NodeRef),

    #[error("aggregation edge {0:?} cannot be reconnected")]
    SyntheticEdge(EdgeRef),

    #[error("{operation} is not supported for aggregation items")]
    AggregationItemNotSupported { operation: &'static str },

    #[error("node {0:?} still has children and must stay a group node")]
    GroupHasChildren(NodeRef),

    #[error("node {0:?} is not a group node")]
    NotAGroupNode(NodeRef),

    #[error("making {child:?} a child of {parent:?} would create a cycle")]
    GroupingCycle { child: NodeRef, parent: NodeRef },

    #[error("unknown aggregate {0}")]
    UnknownAggregate(usize),

    #[error("aggregate {0} already has a parent aggregate")]
    AggregateAlreadyNested(usize),

    #[error("an aggregate needs an original node or child aggregates")]
    EmptyAggregate,

    #[error("node {0:?} is not a collapsed aggregate")]
    NotCollapsed(NodeRef),

    #[error("node {0:?} is not an expanded aggregate")]
    NotExpanded(NodeRef),
}

impl AggregateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AggregateError::NodeNotInGraph(_)
            | AggregateError::EdgeNotInGraph(_)
            | AggregateError::LabelNotInGraph(_)
            | AggregateError::BendNotInGraph(_)
            | AggregateError::DuplicateMember(_)
            | AggregateError::NonFiniteGeometry(_)
            | AggregateError::UnknownAggregate(_)
            | AggregateError::AggregateAlreadyNested(_)
            | AggregateError::EmptyAggregate => ErrorKind::InvalidArgument,
            AggregateError::NotAnAggregationNode(_)
            | AggregateError::SyntheticPort(_)
            | AggregateError::SyntheticEdge(_)
            | AggregateError::GroupHasChildren(_)
            | AggregateError::NotAGroupNode(_)
            | AggregateError::GroupingCycle { .. }
            | AggregateError::NotCollapsed(_)
            | AggregateError::NotExpanded(_) => ErrorKind::InvalidOperation,
            AggregateError::AggregationItemNotSupported { .. } => ErrorKind::NotSupported,
        }
    }

    pub(crate) fn non_finite(what: &str) -> Self {
        AggregateError::NonFiniteGeometry(what.to_string())
    }
}
