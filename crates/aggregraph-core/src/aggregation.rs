//! Edge replacement for aggregation nodes

use crate::config::EdgeReplacementPolicy;
use crate::model::{AggregationEdgeId, EdgeRef, NodeRef};
use std::collections::HashMap;

/// An edge that crosses the boundary of an aggregation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    /// The edge that gets replaced (original or synthetic).
    pub edge: EdgeRef,
    /// The visible node on the outside of the boundary.
    pub other: NodeRef,
    /// Whether the edge leaves the aggregation node.
    pub outgoing: bool,
}

/// Identifies the synthetic edge a crossing edge is merged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplacementKey {
    pub other: NodeRef,
    /// `None` under the undirected policy, where both directions share one edge.
    pub outgoing: Option<bool>,
}

impl ReplacementKey {
    fn for_crossing(policy: EdgeReplacementPolicy, crossing: &Crossing) -> Self {
        ReplacementKey {
            other: crossing.other,
            outgoing: match policy {
                EdgeReplacementPolicy::Directed => Some(crossing.outgoing),
                _ => None,
            },
        }
    }
}

/// A synthetic edge to create, or an existing one to extend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdge {
    pub source: NodeRef,
    pub target: NodeRef,
    /// Edges attached to this synthetic edge, in encounter order.
    pub replaced: Vec<EdgeRef>,
    /// Set when the crossing edges join a synthetic edge that is already visible.
    pub existing: Option<AggregationEdgeId>,
}

/// Compute the deduplicated synthetic edges for the crossing edges of `node`.
///
/// `existing` looks up a visible synthetic edge that already connects `node`
/// to an endpoint under the given key; crossings with such an edge are
/// appended to it instead of producing a duplicate.
pub fn plan_replacements<F>(
    policy: EdgeReplacementPolicy,
    node: NodeRef,
    crossings: &[Crossing],
    existing: F,
) -> Vec<PlannedEdge>
where
    F: Fn(ReplacementKey) -> Option<AggregationEdgeId>,
{
    if policy == EdgeReplacementPolicy::None {
        return Vec::new();
    }

    let mut plan: Vec<PlannedEdge> = Vec::new();
    let mut by_key: HashMap<ReplacementKey, usize> = HashMap::new();

    for crossing in crossings {
        // Loops and edges back into the aggregate never cross the boundary
        if crossing.other == node {
            continue;
        }
        let key = ReplacementKey::for_crossing(policy, crossing);
        let slot = *by_key.entry(key).or_insert_with(|| {
            // First encounter decides the orientation of an undirected edge
            let (source, target) = if crossing.outgoing {
                (node, crossing.other)
            } else {
                (crossing.other, node)
            };
            plan.push(PlannedEdge {
                source,
                target,
                replaced: Vec::new(),
                existing: existing(key),
            });
            plan.len() - 1
        });
        if !plan[slot].replaced.contains(&crossing.edge) {
            plan[slot].replaced.push(crossing.edge);
        }
    }

    plan
}
