use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use linkchart::{EdgeInput, EngineConfig, LayoutMode, NodeInput};
use serde::Deserialize;

/// Everything the app needs before the first frame.
pub(in crate::app) struct LoadedGraph {
    pub nodes: Vec<NodeInput>,
    pub edges: Vec<EdgeInput>,
    pub config: EngineConfig,
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    #[serde(default)]
    nodes: Vec<NodeInput>,
    #[serde(default)]
    edges: Vec<EdgeInput>,
}

#[derive(Clone, Debug)]
pub struct Launch {
    pub graph_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub icon_dir: Option<PathBuf>,
    pub layout: Option<LayoutMode>,
}

pub(in crate::app) fn load(launch: &Launch) -> Result<LoadedGraph> {
    let mut config = match &launch.config_path {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(layout) = launch.layout {
        config.layout_mode = layout;
    }

    let (nodes, edges) = load_graph(&launch.graph_path)?;
    Ok(LoadedGraph {
        nodes,
        edges,
        config,
    })
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config JSON in {}", path.display()))
}

pub(in crate::app) fn load_graph(path: &Path) -> Result<(Vec<NodeInput>, Vec<EdgeInput>)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph {}", path.display()))?;
    parse_graph(&raw).with_context(|| format!("invalid graph file {}", path.display()))
}

fn parse_graph(raw: &str) -> Result<(Vec<NodeInput>, Vec<EdgeInput>)> {
    let file: GraphFile = serde_json::from_str(raw).context("invalid graph JSON")?;
    if let Some(node) = file.nodes.iter().find(|node| node.id.trim().is_empty()) {
        return Err(anyhow!("node with empty id (label `{}`)", node.label));
    }
    Ok((file.nodes, file.edges))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nodes_and_edges() {
        let raw = r#"{
            "nodes": [
                {"id": "p1", "type": "person", "label": "Alice", "x": 10.0, "y": 4.0},
                {"id": "c1", "type": "company"}
            ],
            "edges": [{"source": "p1", "target": "c1", "label": "director"}]
        }"#;
        let (nodes, edges) = parse_graph(raw).expect("valid graph");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].x, Some(10.0));
        assert_eq!(nodes[1].label, "");
        assert_eq!(edges[0].label.as_deref(), Some("director"));
    }

    #[test]
    fn rejects_blank_ids() {
        let raw = r#"{"nodes": [{"id": " ", "type": "person"}]}"#;
        assert!(parse_graph(raw).is_err());
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let (nodes, edges) = parse_graph("{}").expect("empty graph");
        assert!(nodes.is_empty() && edges.is_empty());
    }
}
