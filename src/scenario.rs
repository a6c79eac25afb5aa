//! JSON scenarios: a graph, an optional aggregate hierarchy and a script of
//! operations to run against an aggregate graph.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use aggregraph_core::{
    AggregateGraph, AggregateGraphConfig, AggregateHierarchy, AggregateHierarchyBuilder,
    AggregateId, AggregationHelper, ChangeBatch, EdgeRef, EdgeReplacementPolicy, Graph, GraphEdge,
    GraphNode, Item, NodeRef, Point, Rect, Size,
};
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    /// Root aggregates of an aggregate hierarchy.
    #[serde(default)]
    pub hierarchy: Vec<AggregateSpec>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

#[derive(Debug, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_extent")]
    pub width: f64,
    #[serde(default = "default_extent")]
    pub height: f64,
}

fn default_extent() -> f64 {
    30.0
}

#[derive(Debug, Deserialize)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct AggregateSpec {
    /// Anchor node of the aggregate.
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub children: Vec<AggregateSpec>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Aggregate {
        members: Vec<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Separate {
        node: String,
    },
    SeparateAll,
    RemoveNode {
        node: String,
    },
    SetPolicy {
        policy: EdgeReplacementPolicy,
    },
    AggregateRoots,
    Expand {
        node: String,
    },
    Collapse {
        node: String,
    },
    Toggle {
        node: String,
    },
    ExpandAll,
}

impl Scenario {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("Invalid scenario")
    }
}

/// A node of the visible graph as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct NodeView {
    pub name: String,
    pub aggregation: bool,
    pub layout: Rect,
    /// Names of the original nodes folded into an aggregation node.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgeView {
    pub source: String,
    pub target: String,
    pub aggregation: bool,
    /// Number of original edges shown by this edge.
    pub replaces: usize,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub batches: Vec<ChangeBatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

/// An aggregate graph built from a scenario, with the hierarchy helper and
/// the names used by the operation script.
pub struct Session {
    graph: AggregateGraph,
    helper: AggregationHelper,
    names: HashMap<String, NodeRef>,
    batches: Rc<RefCell<Vec<ChangeBatch>>>,
    rejected: Vec<String>,
}

impl Session {
    pub fn new(scenario: &Scenario, config: AggregateGraphConfig) -> anyhow::Result<Self> {
        let mut graph = Graph::new();
        let mut names = HashMap::new();
        for node in &scenario.nodes {
            if names.contains_key(&node.name) {
                bail!("Duplicate node name: {}", node.name);
            }
            let layout = Rect::from_center(
                Point::new(node.x, node.y),
                Size::new(node.width, node.height),
            );
            let id = graph
                .add_node(GraphNode::labeled(node.name.clone(), layout))
                .with_context(|| format!("Cannot add node {}", node.name))?;
            names.insert(node.name.clone(), NodeRef::Original(id));
        }
        for edge in &scenario.edges {
            let source = original(&names, &edge.source)?;
            let target = original(&names, &edge.target)?;
            graph
                .add_edge(GraphEdge::between(source, target))
                .with_context(|| format!("Cannot add edge {} -> {}", edge.source, edge.target))?;
        }

        let mut builder = AggregateHierarchy::builder();
        for root in &scenario.hierarchy {
            add_aggregate(&mut builder, &names, root)?;
        }
        let helper = AggregationHelper::new(builder.build());

        let mut graph = AggregateGraph::with_config(graph, config);
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&batches);
        graph.subscribe(move |batch| sink.borrow_mut().push(batch.clone()));

        tracing::info!(
            nodes = scenario.nodes.len(),
            edges = scenario.edges.len(),
            aggregates = helper.hierarchy().len(),
            "loaded scenario"
        );
        Ok(Session {
            graph,
            helper,
            names,
            batches,
            rejected: Vec::new(),
        })
    }

    pub fn graph(&self) -> &AggregateGraph {
        &self.graph
    }

    /// Run one operation. Operations the graph rejects are logged and
    /// recorded; unknown node names abort the run.
    pub fn apply(&mut self, operation: &Operation) -> anyhow::Result<()> {
        let outcome = match operation {
            Operation::Aggregate { members, name } => {
                let members = members
                    .iter()
                    .map(|m| self.resolve(m))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                self.graph
                    .aggregate(&members, None, None, None)
                    .map(|id| {
                        let node = NodeRef::Aggregation(id);
                        if let Some(name) = name {
                            self.names.insert(name.clone(), node);
                        }
                    })
            }
            Operation::Separate { node } => {
                let node = self.resolve(node)?;
                self.graph.separate(node)
            }
            Operation::SeparateAll => {
                self.graph.separate_all();
                Ok(())
            }
            Operation::RemoveNode { node } => {
                let node = self.resolve(node)?;
                self.graph.remove_node(node)
            }
            Operation::SetPolicy { policy } => {
                self.graph.set_edge_replacement_policy(*policy);
                Ok(())
            }
            Operation::AggregateRoots => self.helper.aggregate_all_roots(&mut self.graph).map(|_| ()),
            Operation::Expand { node } => {
                let node = self.resolve(node)?;
                self.helper.expand(&mut self.graph, node).map(|_| ())
            }
            Operation::Collapse { node } => {
                let node = self.resolve(node)?;
                self.helper.collapse(&mut self.graph, node).map(|_| ())
            }
            Operation::Toggle { node } => {
                let node = self.resolve(node)?;
                self.helper.toggle(&mut self.graph, node).map(|_| ())
            }
            Operation::ExpandAll => self.helper.expand_all(&mut self.graph).map(|_| ()),
        };

        if let Err(e) = outcome {
            tracing::warn!(?operation, kind = ?e.kind(), "operation rejected: {}", e);
            self.rejected.push(e.to_string());
        }
        Ok(())
    }

    pub fn run(&mut self, operations: &[Operation]) -> anyhow::Result<()> {
        for operation in operations {
            self.apply(operation)?;
        }
        if let Err(violation) = self.graph.check_invariants() {
            bail!("Aggregate graph is inconsistent: {violation}");
        }
        Ok(())
    }

    /// Find a visible node by script name or by its first label.
    fn resolve(&self, name: &str) -> anyhow::Result<NodeRef> {
        if let Some(node) = self.names.get(name) {
            if self.graph.contains_node(*node) {
                return Ok(*node);
            }
        }
        self.graph
            .nodes()
            .find(|node| self.graph.display_name(*node) == name)
            .with_context(|| format!("No visible node named {name}"))
    }

    fn name_of(&self, node: NodeRef) -> String {
        self.names
            .iter()
            .filter(|(_, n)| **n == node)
            .map(|(name, _)| name.clone())
            .min()
            .unwrap_or_else(|| self.graph.display_name(node))
    }

    pub fn report(&self, with_batches: bool) -> Report {
        let graph = &self.graph;
        let nodes = graph
            .nodes()
            .map(|node| NodeView {
                name: self.name_of(node),
                aggregation: node.is_aggregation(),
                layout: graph.node_layout(node).unwrap_or_default(),
                members: graph
                    .all_aggregated_original_items(Item::Node(node))
                    .into_iter()
                    .filter_map(|item| match item {
                        Item::Node(member) => Some(self.name_of(member)),
                        _ => None,
                    })
                    .collect(),
            })
            .collect();
        let edges = graph
            .edges()
            .filter_map(|edge| {
                let (source, target) = graph.edge_endpoints(edge)?;
                let replaces = match edge {
                    EdgeRef::Original(_) => 1,
                    EdgeRef::Aggregation(_) => graph.all_aggregated_original_items(Item::Edge(edge)).len(),
                };
                Some(EdgeView {
                    source: self.name_of(source),
                    target: self.name_of(target),
                    aggregation: edge.is_aggregation(),
                    replaces,
                })
            })
            .collect();
        Report {
            nodes,
            edges,
            batches: if with_batches {
                self.batches.borrow().clone()
            } else {
                Vec::new()
            },
            rejected: self.rejected.clone(),
        }
    }
}

fn original(names: &HashMap<String, NodeRef>, name: &str) -> anyhow::Result<aggregraph_core::NodeId> {
    names
        .get(name)
        .and_then(NodeRef::as_original)
        .with_context(|| format!("Unknown node {name}"))
}

fn add_aggregate(
    builder: &mut AggregateHierarchyBuilder,
    names: &HashMap<String, NodeRef>,
    entry: &AggregateSpec,
) -> anyhow::Result<AggregateId> {
    let node = entry
        .node
        .as_deref()
        .map(|name| original(names, name))
        .transpose()?;
    if entry.children.is_empty() {
        if let Some(node) = node {
            return Ok(builder.add_leaf(node, entry.weight));
        }
    }
    let children = entry
        .children
        .iter()
        .map(|child| add_aggregate(builder, names, child))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(builder.add_aggregate(node, entry.weight, &children)?)
}
