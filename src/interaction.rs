//! Pointer events and hit-testing. The view turns raw pointer input into a closed set of
//! [`GraphEvent`]s delivered to subscribers over channels.

use std::sync::mpsc::{self, Receiver, Sender};

use eframe::egui::{Modifiers, Pos2, Vec2};

use crate::graph::GraphModel;
use crate::render::{EdgePath, FramePlan};
use crate::spatial::{point_curve_distance, point_segment_distance};

/// Nodes smaller than this on screen are still this easy to hit.
const MIN_HIT_RADIUS: f32 = 4.0;
const CURVE_SEGMENTS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInfo {
    pub screen: Pos2,
    pub world: Vec2,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClickTarget {
    Node { id: String },
    Edge { index: usize, source: String, target: String },
    Background,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GraphEvent {
    Hover {
        node: Option<String>,
    },
    Click {
        target: ClickTarget,
        pointer: PointerInfo,
    },
    DragStart {
        node: String,
        pointer: PointerInfo,
    },
    DragMove {
        node: String,
        pointer: PointerInfo,
    },
    DragEnd {
        node: String,
        pointer: PointerInfo,
    },
    SelectionChanged {
        ids: Vec<String>,
        focused: Option<String>,
    },
}

impl GraphEvent {
    pub fn is_context_request(&self) -> bool {
        matches!(
            self,
            Self::Click {
                pointer: PointerInfo {
                    button: PointerButton::Secondary,
                    ..
                },
                ..
            }
        )
    }
}

/// Fan-out of events to every live subscriber. Dropped receivers are pruned on send.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<GraphEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&mut self, event: GraphEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Raw pointer state for one frame, already in screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerInput {
    /// Pointer position while over the canvas.
    pub hover: Option<Pos2>,
    pub pressed: Option<PointerButton>,
    pub released: Option<PointerButton>,
    pub primary_down: bool,
    /// Wheel scroll in points; positive zooms in.
    pub scroll: f32,
    /// Pinch zoom factor, 1 when idle.
    pub zoom_factor: f32,
    pub modifiers: Modifiers,
}

impl PointerInput {
    pub fn is_zooming(&self) -> bool {
        self.scroll != 0.0 || (self.zoom_factor != 0.0 && self.zoom_factor != 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hit {
    Node(usize),
    Edge(usize),
    Background,
}

pub fn exceeds_drag_threshold(origin: Pos2, current: Pos2, threshold: f32) -> bool {
    origin.distance(current) > threshold
}

/// Topmost node under `point`, else the nearest edge within `edge_tolerance` pixels.
pub fn hit_test(plan: &FramePlan, point: Pos2, edge_tolerance: f32) -> Hit {
    let node = plan
        .nodes
        .iter()
        .rev()
        .find(|node| node.center.distance(point) <= node.radius.max(MIN_HIT_RADIUS));
    if let Some(node) = node {
        return Hit::Node(node.index);
    }

    let mut best: Option<(usize, f32)> = None;
    for edge in plan.all_edges() {
        let distance = match edge.path {
            EdgePath::Line => point_segment_distance(point, edge.start, edge.end),
            EdgePath::Curve { control } => {
                point_curve_distance(point, edge.start, control, edge.end, CURVE_SEGMENTS)
            }
            EdgePath::Loop { center, radius } => (center.distance(point) - radius).abs(),
        };
        if distance <= edge_tolerance && best.is_none_or(|(_, nearest)| distance < nearest) {
            best = Some((edge.index, distance));
        }
    }

    best.map_or(Hit::Background, |(index, _)| Hit::Edge(index))
}

pub fn click_target(graph: &GraphModel, hit: Hit) -> ClickTarget {
    match hit {
        Hit::Node(index) => graph
            .node(index)
            .map_or(ClickTarget::Background, |node| ClickTarget::Node {
                id: node.id.clone(),
            }),
        Hit::Edge(index) => graph
            .edge(index)
            .and_then(|edge| {
                Some(ClickTarget::Edge {
                    index,
                    source: graph.node(edge.source)?.id.clone(),
                    target: graph.node(edge.target)?.id.clone(),
                })
            })
            .unwrap_or(ClickTarget::Background),
        Hit::Background => ClickTarget::Background,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LodConfig;
    use crate::graph::{EdgeInput, HighlightState, NodeInput};
    use crate::render::plan_frame;
    use crate::viewport::Viewport;
    use eframe::egui::{Rect, pos2, vec2};

    fn setup() -> (GraphModel, FramePlan) {
        let nodes = vec![
            NodeInput::new("a", "person", "").at(100.0, 100.0),
            NodeInput::new("b", "person", "").at(300.0, 100.0),
        ];
        let edges = vec![EdgeInput::new("a", "b")];
        let graph = GraphModel::from_input(&nodes, &edges, 0.25);
        let mut viewport = Viewport::new();
        viewport.set_canvas(Rect::from_min_size(pos2(0.0, 0.0), vec2(600.0, 400.0)));
        let plan = plan_frame(
            &graph,
            &HighlightState::default(),
            &viewport,
            &LodConfig::default(),
            None,
        )
        .expect("canvas known");
        (graph, plan)
    }

    #[test]
    fn nodes_win_over_edges() {
        let (graph, plan) = setup();
        assert_eq!(hit_test(&plan, pos2(102.0, 101.0), 4.0), Hit::Node(0));
        assert_eq!(hit_test(&plan, pos2(200.0, 103.0), 4.0), Hit::Edge(0));
        assert_eq!(hit_test(&plan, pos2(200.0, 140.0), 4.0), Hit::Background);
        assert_eq!(
            click_target(&graph, Hit::Edge(0)),
            ClickTarget::Edge {
                index: 0,
                source: "a".to_owned(),
                target: "b".to_owned()
            }
        );
    }

    #[test]
    fn bus_delivers_to_every_subscriber() {
        let mut bus = EventBus::default();
        let first = bus.subscribe();
        let second = bus.subscribe();
        bus.emit(GraphEvent::Hover {
            node: Some("a".to_owned()),
        });
        assert_eq!(first.try_iter().count(), 1);
        assert_eq!(second.try_iter().count(), 1);

        drop(first);
        bus.emit(GraphEvent::Hover { node: None });
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn drag_threshold_is_strict() {
        assert!(!exceeds_drag_threshold(pos2(0.0, 0.0), pos2(3.0, 4.0), 5.0));
        assert!(exceeds_drag_threshold(pos2(0.0, 0.0), pos2(3.0, 4.1), 5.0));
    }

    #[test]
    fn secondary_clicks_request_context() {
        let event = GraphEvent::Click {
            target: ClickTarget::Background,
            pointer: PointerInfo {
                screen: pos2(0.0, 0.0),
                world: Vec2::ZERO,
                button: PointerButton::Secondary,
                modifiers: Modifiers::default(),
            },
        };
        assert!(event.is_context_request());
    }
}
