//! Hierarchical aggregate descriptions
//!
//! A node aggregation algorithm decides which original nodes belong
//! together; this module only stores its answer as a forest of aggregates.

use serde::{Deserialize, Serialize};

use crate::error::{AggregateError, Result};
use crate::model::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateId(pub usize);

/// One aggregate: an optional anchor node plus child aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub id: AggregateId,
    /// Original node that stands for this aggregate when it is expanded.
    pub node: Option<NodeId>,
    pub children: Vec<AggregateId>,
    pub parent: Option<AggregateId>,
    /// Weight of the anchor node; zero without one.
    pub weight: f64,
    /// Sum of the weights of all original nodes in this subtree.
    pub descendant_weight_sum: f64,
    /// Number of original nodes in this subtree.
    pub descendant_count: usize,
}

impl Aggregate {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateHierarchy {
    aggregates: Vec<Aggregate>,
    roots: Vec<AggregateId>,
}

impl AggregateHierarchy {
    pub fn builder() -> AggregateHierarchyBuilder {
        AggregateHierarchyBuilder::default()
    }

    pub fn get(&self, id: AggregateId) -> Result<&Aggregate> {
        self.aggregates
            .get(id.0)
            .ok_or(AggregateError::UnknownAggregate(id.0))
    }

    pub fn roots(&self) -> &[AggregateId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aggregate> {
        self.aggregates.iter()
    }

    /// The aggregate and all aggregates below it, in preorder.
    pub fn descendants(&self, id: AggregateId) -> Vec<AggregateId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(aggregate) = self.aggregates.get(current.0) else {
                continue;
            };
            result.push(current);
            stack.extend(aggregate.children.iter().rev());
        }
        result
    }

    /// Anchor node with the highest weight in the subtree. The first one in
    /// preorder wins ties.
    pub fn most_weighted_descendant_node(&self, id: AggregateId) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for current in self.descendants(id) {
            let aggregate = &self.aggregates[current.0];
            if let Some(node) = aggregate.node {
                if best.is_none_or(|(_, weight)| aggregate.weight > weight) {
                    best = Some((node, aggregate.weight));
                }
            }
        }
        best.map(|(node, _)| node)
    }

    /// The aggregate anchored at `node`, if any.
    pub fn aggregate_of(&self, node: NodeId) -> Option<AggregateId> {
        self.aggregates
            .iter()
            .find(|a| a.node == Some(node))
            .map(|a| a.id)
    }
}

/// Builds a hierarchy bottom-up: children are added before their parents.
#[derive(Debug, Default)]
pub struct AggregateHierarchyBuilder {
    aggregates: Vec<Aggregate>,
}

impl AggregateHierarchyBuilder {
    /// An aggregate consisting of a single original node.
    pub fn add_leaf(&mut self, node: NodeId, weight: f64) -> AggregateId {
        let id = AggregateId(self.aggregates.len());
        self.aggregates.push(Aggregate {
            id,
            node: Some(node),
            children: Vec::new(),
            parent: None,
            weight,
            descendant_weight_sum: 0.0,
            descendant_count: 0,
        });
        id
    }

    pub fn add_aggregate(
        &mut self,
        node: Option<NodeId>,
        weight: f64,
        children: &[AggregateId],
    ) -> Result<AggregateId> {
        if node.is_none() && children.is_empty() {
            return Err(AggregateError::EmptyAggregate);
        }
        for (i, child) in children.iter().enumerate() {
            let aggregate = self
                .aggregates
                .get(child.0)
                .ok_or(AggregateError::UnknownAggregate(child.0))?;
            if aggregate.parent.is_some() || children[..i].contains(child) {
                return Err(AggregateError::AggregateAlreadyNested(child.0));
            }
        }
        let id = AggregateId(self.aggregates.len());
        for child in children {
            self.aggregates[child.0].parent = Some(id);
        }
        self.aggregates.push(Aggregate {
            id,
            node,
            children: children.to_vec(),
            parent: None,
            weight: if node.is_some() { weight } else { 0.0 },
            descendant_weight_sum: 0.0,
            descendant_count: 0,
        });
        Ok(id)
    }

    pub fn build(mut self) -> AggregateHierarchy {
        // Children always precede their parents, so one forward pass suffices
        for index in 0..self.aggregates.len() {
            let (weight_sum, count) = self.aggregates[index].children.iter().fold(
                (0.0, 0usize),
                |(sum, count), child| {
                    let child = &self.aggregates[child.0];
                    (sum + child.descendant_weight_sum, count + child.descendant_count)
                },
            );
            let aggregate = &mut self.aggregates[index];
            let own = usize::from(aggregate.node.is_some());
            aggregate.descendant_weight_sum = weight_sum + aggregate.weight;
            aggregate.descendant_count = count + own;
        }
        let roots = self
            .aggregates
            .iter()
            .filter(|a| a.parent.is_none())
            .map(|a| a.id)
            .collect();
        AggregateHierarchy {
            aggregates: self.aggregates,
            roots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_descendant_weights() {
        let mut builder = AggregateHierarchy::builder();
        let a = builder.add_leaf(NodeId(0), 1.0);
        let b = builder.add_leaf(NodeId(1), 4.0);
        let inner = builder.add_aggregate(Some(NodeId(2)), 2.0, &[a, b]).unwrap();
        let c = builder.add_leaf(NodeId(3), 8.0);
        let root = builder.add_aggregate(None, 0.0, &[inner, c]).unwrap();
        let hierarchy = builder.build();

        assert_eq!(hierarchy.roots(), &[root]);
        let inner = hierarchy.get(inner).unwrap();
        assert_eq!(inner.descendant_weight_sum, 7.0);
        assert_eq!(inner.descendant_count, 3);
        let root = hierarchy.get(root).unwrap();
        assert_eq!(root.descendant_weight_sum, 15.0);
        assert_eq!(root.descendant_count, 4);
        assert_eq!(hierarchy.most_weighted_descendant_node(root.id), Some(NodeId(3)));
    }

    #[test]
    fn rejects_reused_children() {
        let mut builder = AggregateHierarchy::builder();
        let a = builder.add_leaf(NodeId(0), 1.0);
        builder.add_aggregate(None, 0.0, &[a]).unwrap();
        assert_eq!(
            builder.add_aggregate(None, 0.0, &[a]),
            Err(AggregateError::AggregateAlreadyNested(0))
        );
        assert_eq!(
            builder.add_aggregate(None, 0.0, &[AggregateId(42)]),
            Err(AggregateError::UnknownAggregate(42))
        );
        assert_eq!(builder.add_aggregate(None, 0.0, &[]), Err(AggregateError::EmptyAggregate));
    }
}
