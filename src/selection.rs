//! Marquee selection. Each node is tested as a small screen-space square; a lasso or
//! rectangle selects it when all corners (full) or any corner (partial) fall inside.

use std::collections::BTreeSet;

use eframe::egui::{Pos2, Rect};

use crate::graph::GraphModel;
use crate::spatial::{point_in_polygon, square_corners};

/// Lasso points closer than this to the previous one are dropped.
const MIN_LASSO_STEP: f32 = 2.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionTool {
    #[default]
    Lasso,
    Rectangle,
}

impl SelectionTool {
    pub fn label(self) -> &'static str {
        match self {
            Self::Lasso => "Lasso",
            Self::Rectangle => "Rectangle",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Containment {
    /// Any corner of the node square inside the region.
    #[default]
    Partial,
    /// Every corner inside.
    Full,
}

impl Containment {
    pub fn label(self) -> &'static str {
        match self {
            Self::Partial => "Partial",
            Self::Full => "Full",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionResult {
    pub ids: BTreeSet<String>,
    /// Set when exactly one node ended up selected.
    pub focused: Option<String>,
}

/// One pointer-down to pointer-up marquee gesture.
#[derive(Clone, Debug)]
pub struct SelectionGesture {
    tool: SelectionTool,
    containment: Containment,
    start: Pos2,
    current: Pos2,
    path: Vec<Pos2>,
    last_ids: BTreeSet<String>,
}

impl SelectionGesture {
    pub fn begin(tool: SelectionTool, containment: Containment, start: Pos2) -> Self {
        Self {
            tool,
            containment,
            start,
            current: start,
            path: vec![start],
            last_ids: BTreeSet::new(),
        }
    }

    pub fn tool(&self) -> SelectionTool {
        self.tool
    }

    pub fn containment(&self) -> Containment {
        self.containment
    }

    pub fn extend(&mut self, point: Pos2) {
        if !point.is_finite() {
            return;
        }
        self.current = point;
        if self.tool == SelectionTool::Lasso
            && self
                .path
                .last()
                .is_none_or(|last| last.distance(point) >= MIN_LASSO_STEP)
        {
            self.path.push(point);
        }
    }

    /// Closed outline of the region in screen space, for the translucent overlay.
    pub fn outline(&self) -> Vec<Pos2> {
        match self.tool {
            SelectionTool::Lasso => self.path.clone(),
            SelectionTool::Rectangle => {
                let rect = self.rect();
                vec![
                    rect.left_top(),
                    rect.right_top(),
                    rect.right_bottom(),
                    rect.left_bottom(),
                ]
            }
        }
    }

    fn rect(&self) -> Rect {
        Rect::from_two_pos(self.start, self.current)
    }

    fn contains_point(&self, point: Pos2) -> bool {
        match self.tool {
            SelectionTool::Lasso => point_in_polygon(point, &self.path),
            SelectionTool::Rectangle => self.rect().contains(point),
        }
    }

    /// Tests the square of side `hit_size` centred on `center`.
    pub fn contains_node(&self, center: Pos2, hit_size: f32) -> bool {
        let corners = square_corners(center, hit_size * 0.5);
        match self.containment {
            Containment::Full => corners.iter().all(|&corner| self.contains_point(corner)),
            Containment::Partial => corners.iter().any(|&corner| self.contains_point(corner)),
        }
    }

    fn hits(&self, graph: &GraphModel, screen: &[Pos2], hit_size: f32) -> BTreeSet<String> {
        graph
            .nodes()
            .iter()
            .zip(screen)
            .filter(|&(_, &center)| self.contains_node(center, hit_size))
            .map(|(node, _)| node.id.clone())
            .collect()
    }

    /// Recomputes the selected ids. Returns them only when they differ from the last
    /// call's result.
    pub fn update(
        &mut self,
        graph: &GraphModel,
        screen: &[Pos2],
        hit_size: f32,
    ) -> Option<BTreeSet<String>> {
        let ids = self.hits(graph, screen, hit_size);
        if ids == self.last_ids {
            return None;
        }
        self.last_ids = ids.clone();
        Some(ids)
    }

    pub fn finish(self, graph: &GraphModel, screen: &[Pos2], hit_size: f32) -> SelectionResult {
        let ids = self.hits(graph, screen, hit_size);
        let focused = if ids.len() == 1 {
            ids.first().cloned()
        } else {
            None
        };
        SelectionResult { ids, focused }
    }
}
