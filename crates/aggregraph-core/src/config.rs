//! Aggregate graph configuration

use serde::{Deserialize, Serialize};

use crate::model::Size;

/// How edges crossing the boundary of a new aggregation node are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeReplacementPolicy {
    /// Crossing edges are hidden without replacement.
    None,
    /// One synthetic edge per external endpoint, whatever the direction.
    #[default]
    Undirected,
    /// At most one synthetic edge per external endpoint and direction.
    Directed,
}

/// Defaults for aggregation nodes created without explicit layout or style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationNodeDefaults {
    pub size: Size,
    pub style: Option<String>,
    /// Label added to every new aggregation node.
    pub label: Option<String>,
}

impl Default for AggregationNodeDefaults {
    fn default() -> Self {
        AggregationNodeDefaults {
            size: Size::new(30.0, 30.0),
            style: None,
            label: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AggregationEdgeDefaults {
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AggregateGraphConfig {
    pub edge_replacement_policy: EdgeReplacementPolicy,
    pub node_defaults: AggregationNodeDefaults,
    pub edge_defaults: AggregationEdgeDefaults,
}

impl AggregateGraphConfig {
    /// Parse a config from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
