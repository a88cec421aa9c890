use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui::epaint::QuadraticBezierShape;
use eframe::egui::{
    Align2, Color32, ColorImage, FontId, Galley, Mesh, Painter, Pos2, Rect, Shape, Stroke,
    TextureHandle, TextureOptions, Vec2, pos2, vec2,
};

use crate::graph::GraphModel;
use crate::icons::IconCache;
use crate::labels::LabelBox;
use crate::spatial::triangulate;
use crate::util::short_label;

use super::style::{
    ACTIVE_RING, EDGE_DEFAULT, EDGE_DIMMED, EDGE_HIGHLIGHT, EDGE_LABEL_TEXT, HIGHLIGHT,
    LABEL_TEXT, OUTLINE, SELECTED, SELECTION_FILL, SELECTION_STROKE, blend_color, dim_color,
    type_color,
};
use super::{DetailTier, EdgeDraw, EdgeGroup, EdgePath, FramePlan, NodeDraw, NodeVisual};

const ARROW_LENGTH: f32 = 7.0;
const MIN_ICON_RADIUS: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintOptions {
    pub show_icons: bool,
    pub show_labels: bool,
    pub font_size: f32,
    pub edge_font_size: f32,
    pub max_chars: usize,
    pub max_edge_labels: usize,
}

struct LabelEntry {
    text: String,
    font_size: f32,
    galley: Arc<Galley>,
}

struct NodeIcon {
    node_type: String,
    texture: TextureHandle,
}

/// Paints frame plans, keeping label galleys and icon textures per node id so they are
/// laid out or uploaded once rather than every frame.
#[derive(Default)]
pub struct FramePainter {
    labels: HashMap<String, LabelEntry>,
    node_icons: HashMap<String, NodeIcon>,
    textures: HashMap<String, TextureHandle>,
}

impl FramePainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops cache entries for nodes that left the graph.
    pub fn retain_nodes(&mut self, graph: &GraphModel) {
        self.labels.retain(|id, _| graph.index_of(id).is_some());
        self.node_icons.retain(|id, _| graph.index_of(id).is_some());
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        self.node_icons.clear();
        self.textures.clear();
    }

    pub fn paint(
        &mut self,
        painter: &Painter,
        plan: &FramePlan,
        graph: &GraphModel,
        labels: &[LabelBox],
        icons: Option<&IconCache>,
        options: &PaintOptions,
    ) {
        let zoom_sqrt = plan.zoom.sqrt();
        for group in EdgeGroup::DRAW_ORDER {
            let shapes = edge_shapes(plan.edges(group), group, plan.tier, zoom_sqrt);
            if !shapes.is_empty() {
                painter.add(Shape::Vec(shapes));
            }
        }

        if plan.tier.shows_edge_labels() {
            paint_edge_labels(painter, plan, graph, options);
        }

        let draw_icons = options.show_icons && plan.tier.shows_icons();
        for node in &plan.nodes {
            self.paint_node(painter, plan.tier, graph, node, draw_icons.then_some(icons).flatten());
        }

        if options.show_labels {
            for label in labels {
                self.paint_label(painter, graph, label, options);
            }
        }
    }

    fn paint_node(
        &mut self,
        painter: &Painter,
        tier: DetailTier,
        graph: &GraphModel,
        draw: &NodeDraw,
        icons: Option<&IconCache>,
    ) {
        let Some(node) = graph.node(draw.index) else {
            return;
        };

        let base = type_color(&node.node_type);
        let fill = match draw.visual {
            NodeVisual::Default => base,
            NodeVisual::Dimmed => dim_color(base, 0.45),
            NodeVisual::Highlighted => blend_color(base, HIGHLIGHT, 0.55),
            NodeVisual::Selected => blend_color(base, SELECTED, 0.7),
            NodeVisual::Active => blend_color(base, ACTIVE_RING, 0.35),
        };
        painter.circle_filled(draw.center, draw.radius, fill);

        let outline = if tier.is_full() { 1.6 } else { 1.0 };
        painter.circle_stroke(draw.center, draw.radius, Stroke::new(outline, OUTLINE));
        match draw.visual {
            NodeVisual::Selected => {
                painter.circle_stroke(draw.center, draw.radius + 3.0, Stroke::new(1.6, SELECTED));
            }
            NodeVisual::Active => {
                painter.circle_stroke(draw.center, draw.radius + 3.0, Stroke::new(2.0, ACTIVE_RING));
            }
            _ => {}
        }

        if let Some(icons) = icons
            && draw.radius >= MIN_ICON_RADIUS
            && let Some(texture) = self.icon_for(painter, icons, &node.id, &node.node_type)
        {
            let rect = Rect::from_center_size(draw.center, Vec2::splat(draw.radius * 1.2));
            let tint = if draw.visual == NodeVisual::Dimmed {
                Color32::from_gray(120)
            } else {
                Color32::WHITE
            };
            painter.image(
                texture.id(),
                rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                tint,
            );
        }
    }

    fn icon_for(
        &mut self,
        painter: &Painter,
        icons: &IconCache,
        id: &str,
        node_type: &str,
    ) -> Option<TextureHandle> {
        if let Some(cached) = self.node_icons.get(id)
            && cached.node_type == node_type
        {
            return Some(cached.texture.clone());
        }

        let texture = match self.textures.get(node_type) {
            Some(texture) => texture.clone(),
            None => {
                let image = icons.get(node_type)?;
                let texture = painter.ctx().load_texture(
                    format!("icon-{node_type}"),
                    ColorImage::from_rgba_unmultiplied(image.size, &image.rgba),
                    TextureOptions::LINEAR,
                );
                self.textures.insert(node_type.to_owned(), texture.clone());
                texture
            }
        };

        self.node_icons.insert(
            id.to_owned(),
            NodeIcon {
                node_type: node_type.to_owned(),
                texture: texture.clone(),
            },
        );
        Some(texture)
    }

    fn paint_label(
        &mut self,
        painter: &Painter,
        graph: &GraphModel,
        label: &LabelBox,
        options: &PaintOptions,
    ) {
        let Some(node) = graph.node(label.index) else {
            return;
        };
        let text = short_label(&node.label, options.max_chars);

        let stale = self.labels.get(&node.id).is_none_or(|entry| {
            entry.text != text || entry.font_size != options.font_size
        });
        if stale {
            let galley = painter.layout_no_wrap(
                text.to_string(),
                FontId::proportional(options.font_size),
                LABEL_TEXT,
            );
            self.labels.insert(
                node.id.clone(),
                LabelEntry {
                    text: text.into_owned(),
                    font_size: options.font_size,
                    galley,
                },
            );
        }

        if let Some(entry) = self.labels.get(&node.id) {
            let size = entry.galley.size();
            let origin = pos2(label.center_x - size.x * 0.5, label.top);
            painter.galley(origin, Arc::clone(&entry.galley), LABEL_TEXT);
        }
    }
}

fn edge_stroke(group: EdgeGroup, scale: f32) -> Stroke {
    match group {
        EdgeGroup::Highlighted => Stroke::new((2.2 * scale).clamp(1.2, 4.4), EDGE_HIGHLIGHT),
        EdgeGroup::Dimmed => Stroke::new((0.8 * scale).clamp(0.45, 2.0), EDGE_DIMMED),
        EdgeGroup::Default => Stroke::new((1.1 * scale).clamp(0.6, 3.4), EDGE_DEFAULT),
    }
}

/// One shape list per group so the whole batch goes to egui in a single `add`.
fn edge_shapes(edges: &[EdgeDraw], group: EdgeGroup, tier: DetailTier, scale: f32) -> Vec<Shape> {
    let stroke = edge_stroke(group, scale);
    let arrows = tier.is_full();
    let mut shapes = Vec::with_capacity(edges.len() * if arrows { 2 } else { 1 });

    for edge in edges {
        match edge.path {
            EdgePath::Line => shapes.push(Shape::line_segment([edge.start, edge.end], stroke)),
            EdgePath::Curve { control } => {
                shapes.push(Shape::QuadraticBezier(QuadraticBezierShape::from_points_stroke(
                    [edge.start, control, edge.end],
                    false,
                    Color32::TRANSPARENT,
                    stroke,
                )));
            }
            EdgePath::Loop { center, radius } => {
                shapes.push(Shape::circle_stroke(center, radius, stroke));
            }
        }

        if arrows && let Some(arrow) = arrowhead(edge, stroke.color) {
            shapes.push(arrow);
        }
    }
    shapes
}

fn arrowhead(edge: &EdgeDraw, color: Color32) -> Option<Shape> {
    let from = match edge.path {
        EdgePath::Line => edge.start,
        EdgePath::Curve { control } => control,
        EdgePath::Loop { .. } => return None,
    };
    let delta = edge.end - from;
    let length = delta.length();
    if length <= f32::EPSILON {
        return None;
    }
    let direction = delta / length;
    let tip = edge.end - direction * edge.target_radius;
    let normal = vec2(-direction.y, direction.x);
    let base = tip - direction * ARROW_LENGTH;
    Some(Shape::convex_polygon(
        vec![tip, base + normal * ARROW_LENGTH * 0.45, base - normal * ARROW_LENGTH * 0.45],
        color,
        Stroke::NONE,
    ))
}

fn paint_edge_labels(painter: &Painter, plan: &FramePlan, graph: &GraphModel, options: &PaintOptions) {
    let font = FontId::proportional(options.edge_font_size);
    let glyph = options.edge_font_size * 0.6;
    let mut drawn = 0;
    for edge in plan.all_edges() {
        if drawn >= options.max_edge_labels {
            break;
        }
        let Some(text) = graph.edge(edge.index).and_then(|edge| edge.label.as_deref()) else {
            continue;
        };
        let text = short_label(text, options.max_chars);
        let width = text.chars().count() as f32 * glyph;
        let room = match edge.path {
            EdgePath::Loop { radius, .. } => radius * 4.0,
            _ => edge.start.distance(edge.end),
        };
        if width > room {
            continue;
        }
        painter.text(edge.midpoint(), Align2::CENTER_CENTER, text, font.clone(), EDGE_LABEL_TEXT);
        drawn += 1;
    }
}

/// Translucent marquee overlay: the outline is filled as a triangulated mesh so concave
/// lasso paths fill correctly, then stroked.
pub fn paint_selection_overlay(painter: &Painter, outline: &[Pos2]) {
    if outline.len() < 2 {
        return;
    }
    let mut mesh = Mesh::default();
    for &point in outline {
        mesh.colored_vertex(point, SELECTION_FILL);
    }
    for [a, b, c] in triangulate(outline) {
        mesh.add_triangle(a as u32, b as u32, c as u32);
    }
    if !mesh.indices.is_empty() {
        painter.add(Shape::mesh(mesh));
    }
    painter.add(Shape::closed_line(
        outline.to_vec(),
        Stroke::new(1.2, SELECTION_STROKE),
    ));
}
