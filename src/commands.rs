//! CLI command implementations

use aggregraph_core::AggregateGraphConfig;
use anyhow::Context;
use std::path::{Path, PathBuf};

use crate::scenario::{Scenario, Session};

/// Load the aggregate graph config, or the defaults without a file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AggregateGraphConfig> {
    let Some(path) = path else {
        return Ok(AggregateGraphConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config {}", path.display()))?;
    let config = AggregateGraphConfig::from_toml_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn load_scenario(path: &Path) -> anyhow::Result<Scenario> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read scenario {}", path.display()))?;
    Scenario::from_json(&text).with_context(|| format!("In {}", path.display()))
}

/// Run the scenario's operations and print the visible graph with every change batch.
pub fn run(scenario: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let scenario = load_scenario(&scenario)?;
    let mut session = Session::new(&scenario, config)?;
    session.run(&scenario.operations)?;

    let report = session.report(true);
    tracing::info!(
        nodes = report.nodes.len(),
        edges = report.edges.len(),
        batches = report.batches.len(),
        rejected = report.rejected.len(),
        "Scenario finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Print the scenario's graph before any operation runs.
pub fn inspect(scenario: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let scenario = load_scenario(&scenario)?;
    let session = Session::new(&scenario, config)?;

    let report = session.report(false);
    println!("{} nodes, {} edges", report.nodes.len(), report.edges.len());
    for node in &report.nodes {
        println!("  node {}", node.name);
    }
    for edge in &report.edges {
        println!("  edge {} -> {}", edge.source, edge.target);
    }
    println!(
        "policy: {:?}, {} operations",
        session.graph().edge_replacement_policy(),
        scenario.operations.len()
    );
    Ok(())
}
