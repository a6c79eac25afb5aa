//! Expand/collapse of hierarchical aggregates on top of an [`AggregateGraph`]
//!
//! A collapsed aggregate is one aggregation node that folds its child
//! aggregates and its anchor node. Expanding it shows the children and wraps
//! the anchor node in a placeholder, an aggregation node with a single
//! member that can be collapsed again.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AggregateError, Result};
use crate::hierarchy::{AggregateHierarchy, AggregateId};
use crate::model::*;
use crate::wrapper::AggregateGraph;

/// What an aggregation node managed by the helper stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationNodeInfo {
    pub aggregate: AggregateId,
    /// `true` for collapsed aggregates, `false` for placeholders.
    pub is_aggregated: bool,
}

pub struct AggregationHelper {
    hierarchy: AggregateHierarchy,
    aggregate_to_node: HashMap<AggregateId, AggregationNodeId>,
    placeholder_map: HashMap<AggregateId, AggregationNodeId>,
    node_info: HashMap<AggregationNodeId, AggregationNodeInfo>,
    /// Center of the last node shown for an aggregate.
    last_center: HashMap<AggregateId, Point>,
    pub aggregation_style: Option<String>,
    pub placeholder_style: Option<String>,
    /// Connect placeholders to their child aggregates when expanding.
    pub show_hierarchy_edges: bool,
}

impl AggregationHelper {
    pub fn new(hierarchy: AggregateHierarchy) -> Self {
        AggregationHelper {
            hierarchy,
            aggregate_to_node: HashMap::new(),
            placeholder_map: HashMap::new(),
            node_info: HashMap::new(),
            last_center: HashMap::new(),
            aggregation_style: Some("aggregate".to_string()),
            placeholder_style: Some("placeholder".to_string()),
            show_hierarchy_edges: false,
        }
    }

    pub fn hierarchy(&self) -> &AggregateHierarchy {
        &self.hierarchy
    }

    /// Helper data of an aggregation node that still exists, visible or not.
    ///
    /// Nodes separated or removed directly on the graph are no longer
    /// reported.
    pub fn info(&self, graph: &AggregateGraph, node: NodeRef) -> Option<AggregationNodeInfo> {
        node.as_aggregation()
            .filter(|id| graph.aggregation_node(*id).is_some())
            .and_then(|id| self.node_info.get(&id))
            .copied()
    }

    /// The collapsed node of an aggregate, if it currently has one.
    pub fn node_of(
        &self,
        graph: &AggregateGraph,
        aggregate: AggregateId,
    ) -> Option<AggregationNodeId> {
        live(graph, self.aggregate_to_node.get(&aggregate))
    }

    pub fn placeholder_of(
        &self,
        graph: &AggregateGraph,
        aggregate: AggregateId,
    ) -> Option<AggregationNodeId> {
        live(graph, self.placeholder_map.get(&aggregate))
    }

    /// Collapse every root aggregate.
    pub fn aggregate_all_roots(&mut self, graph: &mut AggregateGraph) -> Result<Vec<NodeRef>> {
        let roots = self.hierarchy.roots().to_vec();
        roots
            .into_iter()
            .map(|root| self.aggregate_recursively(graph, root))
            .collect()
    }

    /// Collapse `aggregate` and everything below it into one node.
    ///
    /// Leaves are their own original node. Child aggregates that are already
    /// collapsed and visible are reused. An expanded aggregate gives up its
    /// placeholder and the new node takes the placeholder's center.
    pub fn aggregate_recursively(
        &mut self,
        graph: &mut AggregateGraph,
        aggregate: AggregateId,
    ) -> Result<NodeRef> {
        self.check_collapsible(graph, aggregate)?;
        let current = self.hierarchy.get(aggregate)?.clone();
        if current.is_leaf() {
            let node = current.node.ok_or(AggregateError::EmptyAggregate)?;
            return Ok(NodeRef::Original(node));
        }
        if let Some(existing) = self.node_of(graph, aggregate) {
            let existing = NodeRef::Aggregation(existing);
            if graph.contains_node(existing) {
                return Ok(existing);
            }
        }

        let mut center = None;
        if let Some(placeholder) = self.placeholder_of(graph, aggregate) {
            let placeholder_ref = NodeRef::Aggregation(placeholder);
            center = graph.node_layout(placeholder_ref).map(|l| l.center());
            graph.separate(placeholder_ref)?;
            self.node_info.remove(&placeholder);
        }
        self.placeholder_map.remove(&aggregate);

        let mut members = Vec::with_capacity(current.children.len() + 1);
        for child in &current.children {
            members.push(self.aggregate_recursively(graph, *child)?);
        }
        if let Some(node) = current.node {
            members.push(NodeRef::Original(node));
        }

        let center = center
            .or_else(|| self.last_center.get(&aggregate).copied())
            .unwrap_or_else(|| members_center(graph, &members));
        let size = 30.0 + current.descendant_weight_sum.sqrt() * 4.0;
        let layout = Rect::from_center(center, Size::new(size, size));
        let info = AggregationNodeInfo {
            aggregate,
            is_aggregated: true,
        };
        let id = graph.aggregate(
            &members,
            Some(layout),
            self.aggregation_style.clone(),
            serde_json::to_value(info).ok(),
        )?;
        self.aggregate_to_node.insert(aggregate, id);
        self.node_info.insert(id, info);
        self.last_center.insert(aggregate, center);

        // Anchored aggregates show their node's label, the others a proxy
        // for their heaviest descendant
        let label_source = current
            .node
            .or_else(|| self.hierarchy.most_weighted_descendant_node(aggregate));
        if let Some(text) = label_source
            .and_then(|node| graph.node_labels(NodeRef::Original(node)).first().cloned())
        {
            graph.add_label(LabelOwner::Node(NodeRef::Aggregation(id)), text)?;
        }

        tracing::debug!(
            aggregate = aggregate.0,
            node = id.0,
            members = members.len(),
            "collapsed aggregate"
        );
        Ok(NodeRef::Aggregation(id))
    }

    /// Fails unless `aggregate_recursively` can run to the end: every node
    /// it folds must be visible now or come back when a placeholder is
    /// separated, and every placeholder it separates must be visible.
    fn check_collapsible(&self, graph: &AggregateGraph, aggregate: AggregateId) -> Result<()> {
        let current = self.hierarchy.get(aggregate)?;
        if current.is_leaf() {
            let node = current.node.ok_or(AggregateError::EmptyAggregate)?;
            return require_visible(graph, NodeRef::Original(node));
        }
        if let Some(existing) = self.node_of(graph, aggregate) {
            if graph.contains_node(NodeRef::Aggregation(existing)) {
                return Ok(());
            }
        }
        let placeholder = self.placeholder_of(graph, aggregate);
        match (placeholder, current.node) {
            (Some(placeholder), _) => require_visible(graph, NodeRef::Aggregation(placeholder))?,
            (None, Some(anchor)) => require_visible(graph, NodeRef::Original(anchor))?,
            (None, None) => {}
        }
        for child in &current.children {
            self.check_collapsible(graph, *child)?;
        }
        Ok(())
    }

    /// Expand a collapsed aggregate. Returns the nodes now standing for it:
    /// the placeholder of its anchor node (if any) followed by its children.
    pub fn expand(&mut self, graph: &mut AggregateGraph, node: NodeRef) -> Result<Vec<NodeRef>> {
        let info = self
            .info(graph, node)
            .filter(|info| info.is_aggregated)
            .ok_or(AggregateError::NotCollapsed(node))?;
        let Some(id) = node.as_aggregation() else {
            return Err(AggregateError::NotCollapsed(node));
        };
        let current = self.hierarchy.get(info.aggregate)?.clone();
        let center = graph
            .node_layout(node)
            .map(|l| l.center())
            .unwrap_or(Point::ORIGIN);

        graph.separate(node)?;
        self.aggregate_to_node.remove(&info.aggregate);
        self.node_info.remove(&id);
        self.last_center.insert(info.aggregate, center);

        let mut shown = Vec::with_capacity(current.children.len() + 1);
        let mut placeholder = None;
        if let Some(anchor) = current.node {
            let anchor_ref = NodeRef::Original(anchor);
            let size = graph
                .node_layout(anchor_ref)
                .map(|l| l.size())
                .unwrap_or(graph.config().node_defaults.size);
            let placeholder_info = AggregationNodeInfo {
                aggregate: info.aggregate,
                is_aggregated: false,
            };
            let placeholder_id = graph.aggregate(
                &[anchor_ref],
                Some(Rect::from_center(center, size)),
                self.placeholder_style.clone(),
                serde_json::to_value(placeholder_info).ok(),
            )?;
            if let Some(text) = graph.node_labels(anchor_ref).first().cloned() {
                graph.add_label(LabelOwner::Node(NodeRef::Aggregation(placeholder_id)), text)?;
            }
            self.placeholder_map.insert(info.aggregate, placeholder_id);
            self.node_info.insert(placeholder_id, placeholder_info);
            placeholder = Some(NodeRef::Aggregation(placeholder_id));
            shown.push(NodeRef::Aggregation(placeholder_id));
        }

        for child in &current.children {
            let child = self.hierarchy.get(*child)?;
            let child_node = match (child.is_leaf(), self.node_of(graph, child.id)) {
                (false, Some(agg)) => NodeRef::Aggregation(agg),
                _ => match child.node {
                    Some(node) => NodeRef::Original(node),
                    None => continue,
                },
            };
            shown.push(child_node);
            if let Some(placeholder) = placeholder {
                if self.show_hierarchy_edges
                    && graph.edges_between(placeholder, child_node).is_empty()
                    && graph.edges_between(child_node, placeholder).is_empty()
                {
                    graph.create_edge(placeholder, child_node)?;
                }
            }
        }

        tracing::debug!(
            aggregate = info.aggregate.0,
            shown = shown.len(),
            "expanded aggregate"
        );
        Ok(shown)
    }

    /// Collapse the aggregate a placeholder stands for.
    pub fn collapse(&mut self, graph: &mut AggregateGraph, node: NodeRef) -> Result<NodeRef> {
        let info = self
            .info(graph, node)
            .filter(|info| !info.is_aggregated)
            .ok_or(AggregateError::NotExpanded(node))?;
        self.aggregate_recursively(graph, info.aggregate)
    }

    /// Expand collapsed aggregates and collapse placeholders.
    pub fn toggle(&mut self, graph: &mut AggregateGraph, node: NodeRef) -> Result<Vec<NodeRef>> {
        match self.info(graph, node) {
            Some(info) if info.is_aggregated => self.expand(graph, node),
            Some(_) => Ok(vec![self.collapse(graph, node)?]),
            None => Err(AggregateError::NotCollapsed(node)),
        }
    }

    /// Expand collapsed aggregates until none is visible. Returns how many
    /// were expanded.
    pub fn expand_all(&mut self, graph: &mut AggregateGraph) -> Result<usize> {
        let mut expanded = 0;
        loop {
            let next = graph.aggregation_nodes().find(|id| {
                self.node_info
                    .get(id)
                    .is_some_and(|info| info.is_aggregated)
            });
            let Some(id) = next else {
                break;
            };
            self.expand(graph, NodeRef::Aggregation(id))?;
            expanded += 1;
        }
        Ok(expanded)
    }
}

fn live(graph: &AggregateGraph, id: Option<&AggregationNodeId>) -> Option<AggregationNodeId> {
    id.copied().filter(|id| graph.aggregation_node(*id).is_some())
}

fn require_visible(graph: &AggregateGraph, node: NodeRef) -> Result<()> {
    if graph.contains_node(node) {
        Ok(())
    } else {
        Err(AggregateError::NodeNotInGraph(node))
    }
}

fn members_center(graph: &AggregateGraph, members: &[NodeRef]) -> Point {
    members
        .iter()
        .filter_map(|m| graph.node_layout(*m))
        .reduce(|a, b| a.union(&b))
        .map(|bounds| bounds.center())
        .unwrap_or(Point::ORIGIN)
}
