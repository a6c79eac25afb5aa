//! Change notifications for incremental observers

use crate::model::*;
use serde::{Deserialize, Serialize};

/// A single change of the visible graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    NodeCreated { node: NodeRef },
    NodeRemoved { node: NodeRef },
    NodeChanged { node: NodeRef },
    EdgeCreated { edge: EdgeRef },
    EdgeRemoved { edge: EdgeRef },
    EdgeChanged { edge: EdgeRef },
    LabelAdded { label: LabelRef },
    LabelRemoved { label: LabelRef },
    LabelChanged { label: LabelRef },
    BendAdded { bend: BendRef },
    BendRemoved { bend: BendRef },
}

/// All events produced by one mutating call, delivered once the call has
/// restored every invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Monotonically increasing batch sequence number.
    pub sequence: u64,
    pub events: Vec<GraphEvent>,
}

impl ChangeBatch {
    pub fn new(sequence: u64) -> Self {
        ChangeBatch {
            sequence,
            events: Vec::new(),
        }
    }

    /// Check if this batch is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn created_nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.events.iter().filter_map(|e| match e {
            GraphEvent::NodeCreated { node } => Some(*node),
            _ => None,
        })
    }

    pub fn removed_nodes(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.events.iter().filter_map(|e| match e {
            GraphEvent::NodeRemoved { node } => Some(*node),
            _ => None,
        })
    }

    pub fn created_edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.events.iter().filter_map(|e| match e {
            GraphEvent::EdgeCreated { edge } => Some(*edge),
            _ => None,
        })
    }

    pub fn removed_edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.events.iter().filter_map(|e| match e {
            GraphEvent::EdgeRemoved { edge } => Some(*edge),
            _ => None,
        })
    }
}

/// Pending events of the mutation in progress.
pub struct EventQueue {
    sequence: u64,
    pending: Vec<GraphEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            sequence: 0,
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, event: GraphEvent) {
        self.pending.push(event);
    }

    /// Take the pending events as one batch.
    /// Returns None when nothing happened.
    pub fn take_batch(&mut self) -> Option<ChangeBatch> {
        if self.pending.is_empty() {
            return None;
        }
        self.sequence += 1;
        Some(ChangeBatch {
            sequence: self.sequence,
            events: std::mem::take(&mut self.pending),
        })
    }

    /// Get current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub(crate) type Listener = Box<dyn FnMut(&ChangeBatch)>;
