//! Node/edge arena. Adjacency is kept as index lists so nodes never reference each
//! other directly.

use std::collections::HashMap;

use eframe::egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};

mod build;
mod highlight;

pub use build::assign_curvature;
pub use highlight::HighlightState;

/// Node record as supplied by the host application.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NodeInput {
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

impl NodeInput {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: label.into(),
            x: None,
            y: None,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    fn persisted_position(&self) -> Option<Vec2> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(vec2(x, y)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EdgeInput {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl EdgeInput {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub id: String,
    pub node_type: String,
    pub label: String,
}

/// Simulation-side state of a node. `fixed` wins over `pos` while set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Body {
    pub pos: Vec2,
    pub velocity: Vec2,
    pub fixed: Option<Vec2>,
}

impl Body {
    pub fn at(pos: Vec2) -> Self {
        Self {
            pos,
            velocity: Vec2::ZERO,
            fixed: None,
        }
    }

    pub fn pin(&mut self, pos: Vec2) {
        self.pos = pos;
        self.velocity = Vec2::ZERO;
        self.fixed = Some(pos);
    }

    pub fn unpin(&mut self) {
        self.fixed = None;
    }
}

#[derive(Clone, Debug)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    pub label: Option<String>,
    pub curvature: f32,
}

impl GraphEdge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// What `GraphModel::set_data` did with the supplied records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataSummary {
    pub nodes: usize,
    pub edges: usize,
    pub dropped_edges: usize,
    pub duplicate_nodes: usize,
    pub new_nodes: usize,
}

#[derive(Default)]
pub struct GraphModel {
    nodes: Vec<GraphNode>,
    bodies: Vec<Body>,
    edges: Vec<GraphEdge>,
    index_by_id: HashMap<String, usize>,
    neighbors: Vec<Vec<usize>>,
    links: Vec<Vec<usize>>,
    revision: u64,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_input(nodes: &[NodeInput], edges: &[EdgeInput], curvature_step: f32) -> Self {
        let mut model = Self::new();
        model.set_data(nodes, edges, curvature_step);
        model
    }

    /// Replaces the node/edge set. Nodes that survive keep their position, velocity and
    /// pin; edges with an unknown endpoint are dropped.
    pub fn set_data(
        &mut self,
        nodes: &[NodeInput],
        edges: &[EdgeInput],
        curvature_step: f32,
    ) -> DataSummary {
        self.revision = self.revision.wrapping_add(1);
        let mut summary = DataSummary::default();

        let mut prior_bodies = self
            .nodes
            .drain(..)
            .zip(self.bodies.drain(..))
            .map(|(node, body)| (node.id, body))
            .collect::<HashMap<_, _>>();

        let mut next_nodes = Vec::with_capacity(nodes.len());
        let mut next_bodies = Vec::with_capacity(nodes.len());
        let mut index_by_id = HashMap::with_capacity(nodes.len());
        for input in nodes {
            if index_by_id.contains_key(&input.id) {
                summary.duplicate_nodes += 1;
                continue;
            }

            let index = next_nodes.len();
            let body = match prior_bodies.remove(&input.id) {
                Some(body) => body,
                None => {
                    summary.new_nodes += 1;
                    match input.persisted_position() {
                        Some(pos) => {
                            let mut body = Body::at(pos);
                            body.pin(pos);
                            body
                        }
                        None => Body::at(initial_position(index)),
                    }
                }
            };

            index_by_id.insert(input.id.clone(), index);
            next_nodes.push(GraphNode {
                id: input.id.clone(),
                node_type: input.node_type.clone(),
                label: if input.label.is_empty() {
                    input.id.clone()
                } else {
                    input.label.clone()
                },
            });
            next_bodies.push(body);
        }

        let mut next_edges = Vec::with_capacity(edges.len());
        for input in edges {
            let (Some(&source), Some(&target)) = (
                index_by_id.get(&input.source),
                index_by_id.get(&input.target),
            ) else {
                summary.dropped_edges += 1;
                continue;
            };

            next_edges.push(GraphEdge {
                source,
                target,
                label: input.label.clone().filter(|label| !label.is_empty()),
                curvature: 0.0,
            });
        }
        assign_curvature(&mut next_edges, curvature_step);

        let (neighbors, links) = build::adjacency(next_nodes.len(), &next_edges);

        if summary.dropped_edges > 0 {
            log::debug!(
                "dropped {} edge(s) referencing unknown node ids",
                summary.dropped_edges
            );
        }
        if summary.duplicate_nodes > 0 {
            log::debug!("ignored {} duplicate node id(s)", summary.duplicate_nodes);
        }

        self.nodes = next_nodes;
        self.bodies = next_bodies;
        self.edges = next_edges;
        self.index_by_id = index_by_id;
        self.neighbors = neighbors;
        self.links = links;

        summary.nodes = self.nodes.len();
        summary.edges = self.edges.len();
        summary
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&GraphNode> {
        self.nodes.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> Option<&GraphEdge> {
        self.edges.get(index)
    }

    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.neighbors.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn links(&self, index: usize) -> &[usize] {
        self.links.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, index: usize) -> usize {
        self.neighbors(index).len()
    }

    pub fn max_degree(&self) -> usize {
        self.neighbors.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    pub fn position(&self, index: usize) -> Option<Vec2> {
        self.bodies.get(index).map(|body| body.pos)
    }

    /// Directed `(source, target)` index pairs, self-loops excluded.
    pub fn link_pairs(&self) -> Vec<(usize, usize)> {
        self.edges
            .iter()
            .filter(|edge| !edge.is_self_loop())
            .map(|edge| (edge.source, edge.target))
            .collect()
    }

    pub fn pin(&mut self, index: usize, pos: Vec2) {
        if let Some(body) = self.bodies.get_mut(index) {
            body.pin(pos);
        }
    }

    pub fn unpin(&mut self, index: usize) {
        if let Some(body) = self.bodies.get_mut(index) {
            body.unpin();
        }
    }

    pub fn clear_pins(&mut self) {
        for body in &mut self.bodies {
            body.unpin();
        }
    }

    pub fn pin_all(&mut self) {
        for body in &mut self.bodies {
            let pos = body.pos;
            body.pin(pos);
        }
    }

    /// Writes positions onto the live bodies by id. Unknown ids are ignored.
    pub fn apply_positions<'a>(
        &mut self,
        positions: impl IntoIterator<Item = (&'a str, Vec2)>,
    ) -> usize {
        let mut applied = 0;
        for (id, pos) in positions {
            if !pos.x.is_finite() || !pos.y.is_finite() {
                continue;
            }
            if let Some(&index) = self.index_by_id.get(id) {
                let body = &mut self.bodies[index];
                body.pos = pos;
                body.velocity = Vec2::ZERO;
                if body.fixed.is_some() {
                    body.fixed = Some(pos);
                }
                applied += 1;
            }
        }
        applied
    }
}

/// Phyllotaxis spiral, deterministic in the node's insertion index.
fn initial_position(index: usize) -> Vec2 {
    const INITIAL_RADIUS: f32 = 10.0;
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
    let angle = index as f32 * golden_angle;
    vec2(radius * angle.cos(), radius * angle.sin())
}
