//! Level-of-detail rendering. `plan_frame` decides what is drawn and how (tier, culling,
//! visual state, edge batches); `FramePainter` turns a plan into egui shapes.

use eframe::egui::{Pos2, Rect, vec2};

use crate::config::LodConfig;
use crate::graph::{GraphModel, HighlightState};
use crate::spatial::{circle_visible, curve_control, edge_visible};
use crate::viewport::Viewport;

mod paint;
mod style;
mod tier;

pub use paint::{FramePainter, PaintOptions, paint_selection_overlay};
pub use style::{blend_color, dim_color, draw_background, type_color};
pub use tier::{DetailTier, node_radius};

/// Visual state of a node. Later variants win: active > selected > highlighted >
/// dimmed > default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeVisual {
    Default,
    Dimmed,
    Highlighted,
    Selected,
    /// Being dragged or hovered.
    Active,
}

impl NodeVisual {
    pub fn resolve(active: bool, selected: bool, highlighted: bool, any_highlight: bool) -> Self {
        if active {
            Self::Active
        } else if selected {
            Self::Selected
        } else if highlighted {
            Self::Highlighted
        } else if any_highlight {
            Self::Dimmed
        } else {
            Self::Default
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeGroup {
    Highlighted,
    Dimmed,
    Default,
}

impl EdgeGroup {
    /// Back to front.
    pub const DRAW_ORDER: [EdgeGroup; 3] = [EdgeGroup::Dimmed, EdgeGroup::Default, EdgeGroup::Highlighted];

    pub fn resolve(highlighted: bool, any_highlight: bool) -> Self {
        if highlighted {
            Self::Highlighted
        } else if any_highlight {
            Self::Dimmed
        } else {
            Self::Default
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Highlighted => 0,
            Self::Dimmed => 1,
            Self::Default => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EdgePath {
    Line,
    Curve { control: Pos2 },
    Loop { center: Pos2, radius: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeDraw {
    pub index: usize,
    pub start: Pos2,
    pub end: Pos2,
    pub target_radius: f32,
    pub path: EdgePath,
}

impl EdgeDraw {
    /// Point halfway along the drawn path, where an edge label sits.
    pub fn midpoint(&self) -> Pos2 {
        match self.path {
            EdgePath::Line => self.start + (self.end - self.start) * 0.5,
            EdgePath::Curve { control } => {
                crate::spatial::quadratic_point(self.start, control, self.end, 0.5)
            }
            EdgePath::Loop { center, radius } => center - vec2(0.0, radius),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeDraw {
    pub index: usize,
    pub center: Pos2,
    pub radius: f32,
    pub visual: NodeVisual,
}

#[derive(Debug)]
pub struct FramePlan {
    pub tier: DetailTier,
    pub zoom: f32,
    pub canvas: Rect,
    /// Screen position of every node, visible or not.
    pub screen: Vec<Pos2>,
    /// Screen radius of every node.
    pub radii: Vec<f32>,
    /// Visible nodes, back to front.
    pub nodes: Vec<NodeDraw>,
    edges: [Vec<EdgeDraw>; 3],
    /// Edges dropped for being shorter than the edge threshold on screen.
    pub short_edges: usize,
}

impl FramePlan {
    pub fn edges(&self, group: EdgeGroup) -> &[EdgeDraw] {
        &self.edges[group.slot()]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &EdgeDraw> {
        EdgeGroup::DRAW_ORDER
            .into_iter()
            .flat_map(|group| self.edges(group).iter())
    }
}

/// Screen-space geometry and visual state for one frame. Returns `None` while the
/// canvas size is unknown.
pub fn plan_frame(
    graph: &GraphModel,
    highlight: &HighlightState,
    viewport: &Viewport,
    lod: &LodConfig,
    active: Option<usize>,
) -> Option<FramePlan> {
    let canvas = viewport.canvas()?;
    let k = viewport.zoom();
    let tier = DetailTier::for_zoom(k, lod);
    let any_highlight = highlight.is_active();

    let mut screen = Vec::with_capacity(graph.node_count());
    let mut radii = Vec::with_capacity(graph.node_count());
    for (index, body) in graph.bodies().iter().enumerate() {
        screen.push(viewport.world_to_screen(body.pos));
        radii.push((node_radius(graph.degree(index), k, lod) * k).max(1.5));
    }

    let mut nodes = graph
        .nodes()
        .iter()
        .enumerate()
        .filter(|&(index, _)| circle_visible(canvas, screen[index], radii[index]))
        .map(|(index, node)| NodeDraw {
            index,
            center: screen[index],
            radius: radii[index],
            visual: NodeVisual::resolve(
                active == Some(index),
                highlight.is_selected(&node.id),
                highlight.is_node_highlighted(index),
                any_highlight,
            ),
        })
        .collect::<Vec<_>>();
    nodes.sort_by_key(|node| node.visual);

    let min_length = lod.edge_min_screen_length.max(0.0);
    let mut edges: [Vec<EdgeDraw>; 3] = Default::default();
    let mut short_edges = 0;
    for (index, edge) in graph.edges().iter().enumerate() {
        let start = screen[edge.source];
        let end = screen[edge.target];

        let path = if edge.is_self_loop() {
            let radius = (radii[edge.source] * 0.8 + 4.0) * (1.0 + edge.curvature * 2.0);
            let center = start - vec2(0.0, radii[edge.source] + radius * 0.7);
            if !circle_visible(canvas, center, radius) {
                continue;
            }
            EdgePath::Loop { center, radius }
        } else {
            if (end - start).length() < min_length {
                short_edges += 1;
                continue;
            }
            if edge.curvature == 0.0 {
                if !edge_visible(canvas, start, end, 2.0) {
                    continue;
                }
                EdgePath::Line
            } else {
                let control = curve_control(start, end, edge.curvature);
                if !edge_visible(canvas, start, control, 2.0)
                    && !edge_visible(canvas, control, end, 2.0)
                {
                    continue;
                }
                EdgePath::Curve { control }
            }
        };

        let group = EdgeGroup::resolve(highlight.is_edge_highlighted(index), any_highlight);
        edges[group.slot()].push(EdgeDraw {
            index,
            start,
            end,
            target_radius: radii[edge.target],
            path,
        });
    }

    Some(FramePlan {
        tier,
        zoom: k,
        canvas,
        screen,
        radii,
        nodes,
        edges,
        short_edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeInput, NodeInput};
    use eframe::egui::pos2;

    fn graph() -> GraphModel {
        let nodes = vec![
            NodeInput::new("a", "person", "A").at(100.0, 100.0),
            NodeInput::new("b", "person", "B").at(200.0, 100.0),
            NodeInput::new("c", "device", "C").at(300.0, 300.0),
            NodeInput::new("d", "device", "D").at(5000.0, 5000.0),
        ];
        let edges = vec![
            EdgeInput::new("a", "b"),
            EdgeInput::new("b", "c"),
            EdgeInput::new("a", "b"),
            EdgeInput::new("c", "c"),
        ];
        GraphModel::from_input(&nodes, &edges, 0.25)
    }

    fn viewport() -> Viewport {
        let mut viewport = Viewport::new();
        viewport.set_canvas(Rect::from_min_size(Pos2::ZERO, vec2(800.0, 600.0)));
        viewport
    }

    #[test]
    fn visual_precedence() {
        assert_eq!(NodeVisual::resolve(true, true, true, true), NodeVisual::Active);
        assert_eq!(NodeVisual::resolve(false, true, true, true), NodeVisual::Selected);
        assert_eq!(NodeVisual::resolve(false, false, true, true), NodeVisual::Highlighted);
        assert_eq!(NodeVisual::resolve(false, false, false, true), NodeVisual::Dimmed);
        assert_eq!(NodeVisual::resolve(false, false, false, false), NodeVisual::Default);
    }

    #[test]
    fn plan_waits_for_canvas() {
        let graph = graph();
        let highlight = HighlightState::default();
        assert!(plan_frame(&graph, &highlight, &Viewport::new(), &LodConfig::default(), None).is_none());
    }

    #[test]
    fn offscreen_nodes_are_culled() {
        let graph = graph();
        let highlight = HighlightState::default();
        let plan = plan_frame(&graph, &highlight, &viewport(), &LodConfig::default(), None)
            .expect("canvas known");
        let visible = plan.nodes.iter().map(|node| node.index).collect::<Vec<_>>();
        assert_eq!(visible.len(), 3);
        assert!(!visible.contains(&graph.index_of("d").unwrap()));
        assert_eq!(plan.screen.len(), 4);
    }

    #[test]
    fn edges_split_into_groups_when_highlighted() {
        let graph = graph();
        let mut highlight = HighlightState::default();
        highlight.set_hovered(&graph, graph.index_of("c"));
        let plan = plan_frame(&graph, &highlight, &viewport(), &LodConfig::default(), highlight.hovered())
            .expect("canvas known");

        // c's incident edges: b-c and the self-loop.
        assert_eq!(plan.edges(EdgeGroup::Highlighted).len(), 2);
        assert_eq!(plan.edges(EdgeGroup::Dimmed).len(), 2);
        assert!(plan.edges(EdgeGroup::Default).is_empty());
        assert_eq!(plan.nodes.last().map(|node| node.visual), Some(NodeVisual::Active));
        assert!(plan.nodes.iter().any(|node| node.visual == NodeVisual::Dimmed));
    }

    #[test]
    fn parallel_edges_curve_and_self_loops_loop() {
        let graph = graph();
        let plan = plan_frame(&graph, &HighlightState::default(), &viewport(), &LodConfig::default(), None)
            .expect("canvas known");
        let edges = plan.edges(EdgeGroup::Default);
        let curved = edges
            .iter()
            .filter(|edge| matches!(edge.path, EdgePath::Curve { .. }))
            .count();
        assert_eq!(curved, 2);
        assert!(edges.iter().any(|edge| matches!(edge.path, EdgePath::Loop { .. })));
    }

    #[test]
    fn tiny_edges_are_skipped_when_zoomed_out() {
        let graph = graph();
        let mut viewport = viewport();
        viewport.zoom_by(0.001, pos2(0.0, 0.0));
        let lod = LodConfig {
            edge_min_screen_length: 6.0,
            ..LodConfig::default()
        };
        let plan = plan_frame(&graph, &HighlightState::default(), &viewport, &lod, None)
            .expect("canvas known");
        assert_eq!(plan.tier, DetailTier::Minimal);
        // Both a-b edges are 5px long; b-c stays at about 11px.
        assert_eq!(plan.short_edges, 2);
    }
}
