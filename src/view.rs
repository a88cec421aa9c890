//! The engine facade. `GraphView` owns the graph, camera, layout runs, label placement
//! and pointer gestures; a host feeds it pointer input and drives `update` and `paint`
//! once per frame.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;

use eframe::egui::{Modifiers, Painter, Pos2, Rect, Vec2, pos2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use thiserror::Error;

use crate::config::{EngineConfig, LayoutMode};
use crate::graph::{DataSummary, EdgeInput, GraphModel, HighlightState, NodeInput};
use crate::icons::IconCache;
use crate::interaction::{
    ClickTarget, EventBus, GraphEvent, Hit, PointerButton, PointerInfo, PointerInput,
    click_target, exceeds_drag_threshold, hit_test,
};
use crate::labels::{LabelBox, LabelCandidate, LabelScheduler, estimate_size, select_labels};
use crate::layout::{
    ForceSimulation, LayoutCoordinator, LayoutError, LayoutOptions, LayoutOutcome, LayoutTicket,
};
use crate::render::{
    DetailTier, FramePainter, FramePlan, PaintOptions, draw_background, paint_selection_overlay,
    plan_frame,
};
use crate::selection::{Containment, SelectionGesture, SelectionTool};
use crate::spatial::bounds_of;
use crate::util::short_label;
use crate::viewport::{Transform, Viewport};

/// Gap between a node's rim and the top of its label.
const LABEL_GAP: f32 = 2.0;
const LAYOUT_FAILED_NOTICE: &str = "Layout failed, try again";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("simulation produced non-finite positions")]
    NonFinite,
    #[error("frame step panicked: {0}")]
    Panicked(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct HoverInfo {
    pub id: String,
    pub label: String,
    pub node_type: String,
    pub degree: usize,
    pub screen: Pos2,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub tier: DetailTier,
    pub zoom: f32,
    pub visible_nodes: usize,
    pub visible_edges: usize,
    pub labels: usize,
    pub layout_progress: Option<f32>,
    /// Something is moving; the host should repaint right away.
    pub animating: bool,
    /// Seconds until a throttled label pass becomes due, if one is pending.
    pub repaint_after: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LayoutScope {
    All,
    Unpinned,
}

enum Gesture {
    Idle,
    Pressed {
        hit: Hit,
        origin: Pos2,
        button: PointerButton,
    },
    DraggingNode {
        index: usize,
        /// Node position minus pointer position, in world units.
        grab: Vec2,
    },
    Panning {
        last: Pos2,
    },
    Selecting(SelectionGesture),
}

impl Gesture {
    fn holds_primary(&self) -> bool {
        matches!(
            self,
            Self::Pressed {
                button: PointerButton::Primary,
                ..
            } | Self::DraggingNode { .. }
                | Self::Panning { .. }
                | Self::Selecting(_)
        )
    }
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

pub struct GraphView {
    config: EngineConfig,
    graph: GraphModel,
    links: Vec<(usize, usize)>,
    highlight: HighlightState,
    viewport: Viewport,
    coordinator: LayoutCoordinator,
    simulation: ForceSimulation,
    /// Size of the frame the last layout filled; the live simulation centres on it.
    layout_size: Vec2,
    deferred_layout: Option<LayoutScope>,
    events: EventBus,
    gesture: Gesture,
    selection_tool: Option<SelectionTool>,
    containment: Containment,
    search: String,
    labels: LabelScheduler,
    label_boxes: Vec<LabelBox>,
    seen_viewport_revision: u64,
    painter: FramePainter,
    icons: Option<IconCache>,
    plan: Option<FramePlan>,
    last_pointer: Option<Pos2>,
    halted: bool,
    notices: Vec<String>,
    #[cfg(test)]
    fail_planning: bool,
}

impl GraphView {
    pub fn new(config: EngineConfig, icons: Option<IconCache>) -> Self {
        let mut simulation = ForceSimulation::new(config.force);
        simulation.stop();
        Self {
            graph: GraphModel::new(),
            links: Vec::new(),
            highlight: HighlightState::default(),
            viewport: Viewport::new(),
            coordinator: LayoutCoordinator::new(config.worker_threshold),
            simulation,
            layout_size: Vec2::ZERO,
            deferred_layout: None,
            events: EventBus::default(),
            gesture: Gesture::Idle,
            selection_tool: None,
            containment: Containment::default(),
            search: String::new(),
            labels: LabelScheduler::new(&config.labels),
            label_boxes: Vec::new(),
            seen_viewport_revision: 0,
            painter: FramePainter::new(),
            icons,
            plan: None,
            last_pointer: None,
            halted: false,
            notices: Vec::new(),
            #[cfg(test)]
            fail_planning: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies new tuning. The layout mode and edge spacing take effect on the next
    /// layout and data update respectively.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.simulation.set_config(config.force);
        self.coordinator.set_worker_threshold(config.worker_threshold);
        self.labels.set_config(&config.labels);
        self.config = config;
    }

    pub fn set_show_icons(&mut self, show: bool) {
        self.config.show_icons = show;
    }

    pub fn set_show_labels(&mut self, show: bool) {
        self.config.show_labels = show;
        self.labels.invalidate();
    }

    pub fn set_icon_cache(&mut self, icons: Option<IconCache>) {
        self.icons = icons;
        self.painter.clear();
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn highlight(&self) -> &HighlightState {
        &self.highlight
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_viewport(&mut self) -> Receiver<Transform> {
        self.viewport.subscribe()
    }

    /// Messages for the host to surface briefly, oldest first.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Replaces the graph. Surviving nodes keep their place; new nodes without a stored
    /// position are laid out around the pinned rest.
    pub fn set_data(&mut self, nodes: &[NodeInput], edges: &[EdgeInput]) -> DataSummary {
        let summary = self
            .graph
            .set_data(nodes, edges, self.config.parallel_edge_spacing);
        self.links = self.graph.link_pairs();
        self.highlight.prune(&self.graph);
        self.painter.retain_nodes(&self.graph);
        self.label_boxes.clear();
        self.labels.invalidate();
        self.gesture = Gesture::Idle;
        self.viewport.set_drag_lock(false);
        self.halted = false;
        if !self.search.is_empty() {
            let query = self.search.clone();
            self.set_search(&query);
        }

        log::info!(
            "graph data: {} nodes, {} edges ({} new, {} dropped edges)",
            summary.nodes,
            summary.edges,
            summary.new_nodes,
            summary.dropped_edges
        );

        let unplaced = self.graph.bodies().iter().any(|body| body.fixed.is_none());
        if unplaced {
            if let Err(error) = self.run_layout(LayoutScope::Unpinned) {
                self.layout_failed(&error);
            }
        } else if summary.new_nodes > 0 {
            self.zoom_to_fit();
        }
        summary
    }

    // Camera

    pub fn transform(&self) -> Transform {
        self.viewport.transform()
    }

    pub fn zoom_in(&mut self) -> bool {
        self.viewport.zoom_in()
    }

    pub fn zoom_out(&mut self) -> bool {
        self.viewport.zoom_out()
    }

    pub fn zoom_to_fit(&mut self) -> bool {
        let bounds = bounds_of(self.graph.bodies().iter().map(|body| body.pos));
        self.viewport.zoom_to_fit(bounds)
    }

    pub fn zoom_to_nodes<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        let bounds = bounds_of(
            ids.into_iter()
                .filter_map(|id| self.graph.index_of(id))
                .filter_map(|index| self.graph.position(index)),
        );
        self.viewport.zoom_to_fit(bounds)
    }

    pub fn zoom_to_selection(&mut self) -> bool {
        let bounds = bounds_of(
            self.highlight
                .selected()
                .iter()
                .filter_map(|id| self.graph.index_of(id))
                .filter_map(|index| self.graph.position(index)),
        );
        self.viewport.zoom_to_fit(bounds)
    }

    pub fn center_on_node(&mut self, id: &str) -> bool {
        let Some(position) = self
            .graph
            .index_of(id)
            .and_then(|index| self.graph.position(index))
        else {
            return false;
        };
        self.viewport.center_on(position)
    }

    pub fn center_on(&mut self, world: Vec2) -> bool {
        self.viewport.center_on(world)
    }

    /// World point at the middle of the canvas, once the canvas size is known.
    pub fn viewport_center(&self) -> Option<Vec2> {
        self.viewport.center_world()
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Vec2 {
        self.viewport.screen_to_world(screen)
    }

    pub fn world_to_screen(&self, world: Vec2) -> Pos2 {
        self.viewport.world_to_screen(world)
    }

    // Layout

    pub fn layout_mode(&self) -> LayoutMode {
        self.config.layout_mode
    }

    pub fn set_layout_mode(
        &mut self,
        mode: LayoutMode,
    ) -> Result<Option<LayoutTicket>, LayoutError> {
        self.config.layout_mode = mode;
        self.regenerate_layout()
    }

    /// Lays the whole graph out again under the current mode. `Ok(None)` means the run
    /// waits for the first frame with a known canvas size.
    pub fn regenerate_layout(&mut self) -> Result<Option<LayoutTicket>, LayoutError> {
        self.run_layout(LayoutScope::All)
    }

    pub fn is_layout_running(&self) -> bool {
        self.coordinator.is_running()
    }

    pub fn layout_progress(&self) -> Option<f32> {
        self.coordinator.progress().map(|progress| progress.fraction())
    }

    fn run_layout(&mut self, scope: LayoutScope) -> Result<Option<LayoutTicket>, LayoutError> {
        let Some(canvas) = self.viewport.canvas() else {
            self.deferred_layout = match (self.deferred_layout, scope) {
                (Some(LayoutScope::All), _) | (_, LayoutScope::All) => Some(LayoutScope::All),
                _ => Some(LayoutScope::Unpinned),
            };
            log::debug!("layout deferred until the canvas size is known");
            return Ok(None);
        };
        self.deferred_layout = None;
        if self.gesture_is_drag() {
            self.end_drag();
        }

        self.simulation.stop();
        self.layout_size = canvas.size();
        let options = LayoutOptions {
            mode: self.config.layout_mode,
            size: canvas.size(),
            force: self.config.force,
        };
        let ticket = match scope {
            LayoutScope::All => self.coordinator.regenerate(&mut self.graph, options),
            LayoutScope::Unpinned => self.coordinator.place_unpinned(&mut self.graph, options),
        }?;

        self.labels.invalidate();
        if matches!(ticket, LayoutTicket::Completed { .. }) {
            self.zoom_to_fit();
        }
        Ok(Some(ticket))
    }

    fn layout_failed(&mut self, error: &LayoutError) {
        log::warn!("layout failed: {error}");
        self.notices.push(LAYOUT_FAILED_NOTICE.to_owned());
    }

    fn on_layout_outcome(&mut self, outcome: LayoutOutcome) {
        match outcome {
            LayoutOutcome::Progress { .. } => {}
            LayoutOutcome::Completed { .. } => {
                self.labels.invalidate();
                self.zoom_to_fit();
            }
            LayoutOutcome::Failed { error, .. } => {
                self.layout_failed(&error);
            }
        }
    }

    // Selection and search

    pub fn selected_ids(&self) -> Vec<String> {
        self.highlight.selected().iter().cloned().collect()
    }

    pub fn focused_node(&self) -> Option<&str> {
        self.highlight.focused()
    }

    /// Replaces the selection. Emits `SelectionChanged` only when the set changed.
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = String>) -> bool {
        let changed = self.highlight.set_selected(&self.graph, ids);
        if changed {
            self.focus_single_selection();
            self.emit_selection();
        }
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        self.set_selection(std::iter::empty())
    }

    pub fn selection_tool(&self) -> Option<SelectionTool> {
        self.selection_tool
    }

    /// Arms a marquee tool: primary drags off nodes then select instead of panning.
    pub fn set_selection_tool(&mut self, tool: Option<SelectionTool>) {
        self.selection_tool = tool;
    }

    pub fn containment(&self) -> Containment {
        self.containment
    }

    pub fn set_containment(&mut self, containment: Containment) {
        self.containment = containment;
    }

    /// Highlights nodes whose label or id fuzzily matches `query`. Returns the match
    /// count; an empty query clears the highlight.
    pub fn set_search(&mut self, query: &str) -> usize {
        self.search = query.trim().to_owned();
        let matches = if self.search.is_empty() {
            HashSet::new()
        } else {
            let matcher = SkimMatcherV2::default();
            self.graph
                .nodes()
                .iter()
                .enumerate()
                .filter(|(_, node)| {
                    fuzzy_match_score(&matcher, &node.label, &self.search).is_some()
                        || fuzzy_match_score(&matcher, &node.id, &self.search).is_some()
                })
                .map(|(index, _)| index)
                .collect::<HashSet<_>>()
        };
        let count = matches.len();
        self.highlight.set_search_matches(&self.graph, matches);
        self.labels.invalidate();
        count
    }

    fn focus_single_selection(&mut self) {
        let selected = self.highlight.selected();
        let focused = if selected.len() == 1 {
            selected.first().cloned()
        } else {
            None
        };
        self.highlight.set_focused(focused);
    }

    fn emit_selection(&mut self) {
        self.labels.invalidate();
        self.events.emit(GraphEvent::SelectionChanged {
            ids: self.selected_ids(),
            focused: self.highlight.focused().map(str::to_owned),
        });
    }

    // Frame loop

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Restarts animation after a frame failure.
    pub fn resume(&mut self) {
        if self.halted {
            log::info!("resuming animation");
            self.halted = false;
        }
    }

    /// Advances one frame: merges layout results, steps animations and the live
    /// simulation, then rebuilds the frame plan and label placement. A panic or
    /// non-finite position anywhere in that pipeline halts animation; the error is
    /// returned once and later frames keep the last good plan.
    pub fn update(&mut self, canvas: Rect, now: f64) -> Result<FrameStats, FrameError> {
        self.viewport.set_canvas(canvas);
        if let Some(scope) = self.deferred_layout
            && self.viewport.canvas().is_some()
            && let Err(error) = self.run_layout(scope)
        {
            self.layout_failed(&error);
        }
        for outcome in self.coordinator.poll(&mut self.graph) {
            self.on_layout_outcome(outcome);
        }

        let was_halted = self.halted;
        let frame = panic::catch_unwind(AssertUnwindSafe(|| self.run_frame(now)))
            .unwrap_or_else(|payload| Err(FrameError::Panicked(panic_message(payload.as_ref()))));
        if let Err(error) = frame {
            if was_halted {
                log::debug!("frame failed while halted: {error}");
            } else {
                self.halt(&error);
                return Err(error);
            }
        }
        Ok(self.stats(now))
    }

    fn halt(&mut self, error: &FrameError) {
        log::error!("animation halted: {error}");
        self.halted = true;
        self.simulation.stop();
    }

    fn run_frame(&mut self, now: f64) -> Result<(), FrameError> {
        let step = if self.halted {
            Ok(())
        } else {
            self.step_animation(now)
        };

        if self.viewport.revision() != self.seen_viewport_revision {
            self.seen_viewport_revision = self.viewport.revision();
            self.labels.invalidate();
        }

        #[cfg(test)]
        if self.fail_planning {
            panic!("planning failed");
        }
        self.plan = plan_frame(
            &self.graph,
            &self.highlight,
            &self.viewport,
            &self.config.lod,
            self.active_node(),
        );
        self.refresh_labels(now);
        step
    }

    fn step_animation(&mut self, now: f64) -> Result<(), FrameError> {
        let live_force = self.live_force_active();
        self.viewport.tick(now);
        if live_force {
            let center = self.layout_size * 0.5;
            self.simulation
                .tick(self.graph.bodies_mut(), &self.links, center);
        }

        if live_force {
            self.labels.invalidate();
        }
        if self.graph.bodies().iter().any(|body| !body.pos.is_finite()) {
            return Err(FrameError::NonFinite);
        }
        Ok(())
    }

    fn live_force_active(&self) -> bool {
        self.config.layout_mode == LayoutMode::Force
            && !self.coordinator.is_running()
            && !self.simulation.is_settled()
    }

    fn active_node(&self) -> Option<usize> {
        match self.gesture {
            Gesture::DraggingNode { index, .. } => Some(index),
            _ => self.highlight.hovered(),
        }
    }

    fn stats(&self, now: f64) -> FrameStats {
        let (tier, zoom, visible_nodes, visible_edges) = match &self.plan {
            Some(plan) => (plan.tier, plan.zoom, plan.nodes.len(), plan.edge_count()),
            None => (
                DetailTier::for_zoom(self.viewport.zoom(), &self.config.lod),
                self.viewport.zoom(),
                0,
                0,
            ),
        };
        FrameStats {
            tier,
            zoom,
            visible_nodes,
            visible_edges,
            labels: self.label_boxes.len(),
            layout_progress: self.layout_progress(),
            animating: !self.halted
                && (self.viewport.is_animating()
                    || self.live_force_active()
                    || self.coordinator.is_running()
                    || !matches!(self.gesture, Gesture::Idle)),
            repaint_after: self.labels.next_wakeup(now),
        }
    }

    fn refresh_labels(&mut self, now: f64) {
        let Some(plan) = self.plan.as_ref() else {
            self.label_boxes.clear();
            return;
        };
        if !self.config.show_labels || self.labels.is_suspended(now) {
            self.label_boxes.clear();
            return;
        }

        if self.labels.should_run(now) {
            let candidates = label_candidates(&self.graph, &self.highlight, plan, &self.config);
            let placement = select_labels(&candidates, plan.canvas.center(), &self.config.labels);
            log::trace!(
                "labels: {} placed, {} rejected ({:?})",
                placement.placed.len(),
                placement.rejected,
                placement.mode
            );
            self.label_boxes = placement.placed;
            self.labels.mark_ran(now);
        }

        // Placement is throttled; positions follow the nodes every frame.
        for label in &mut self.label_boxes {
            if let Some(anchor) = label_anchor(plan, label.index) {
                label.center_x = anchor.x;
                label.top = anchor.y;
            }
        }
    }

    /// Paints the last planned frame. A panic while painting halts animation like a
    /// failed `update`.
    pub fn paint(&mut self, painter: &Painter) {
        let painted = panic::catch_unwind(AssertUnwindSafe(|| self.paint_plan(painter)));
        if let Err(payload) = painted
            && !self.halted
        {
            let error = FrameError::Panicked(panic_message(payload.as_ref()));
            self.halt(&error);
            self.notices.push(format!("Rendering paused: {error}"));
        }
    }

    fn paint_plan(&mut self, painter: &Painter) {
        let Some(plan) = self.plan.as_ref() else {
            return;
        };
        draw_background(painter, plan.canvas, self.viewport.transform());
        let options = PaintOptions {
            show_icons: self.config.show_icons,
            show_labels: self.config.show_labels,
            font_size: self.config.labels.font_size(),
            edge_font_size: self.config.labels.edge_font_size(),
            max_chars: self.config.labels.max_chars,
            max_edge_labels: self.config.labels.max_labels,
        };
        self.painter.paint(
            painter,
            plan,
            &self.graph,
            &self.label_boxes,
            self.icons.as_ref(),
            &options,
        );
        if let Gesture::Selecting(gesture) = &self.gesture {
            paint_selection_overlay(painter, &gesture.outline());
        }
    }

    /// Node under the pointer with its screen position, for tooltips.
    pub fn hover_info(&self) -> Option<HoverInfo> {
        let index = self.highlight.hovered()?;
        let node = self.graph.node(index)?;
        let screen = self.plan.as_ref()?.screen.get(index).copied()?;
        Some(HoverInfo {
            id: node.id.clone(),
            label: node.label.clone(),
            node_type: node.node_type.clone(),
            degree: self.graph.degree(index),
            screen,
        })
    }

    // Pointer input

    /// Consumes one frame of pointer state against the plan built by the last `update`.
    pub fn handle_input(&mut self, input: &PointerInput, now: f64) {
        let Some(plan) = self.plan.take() else {
            return;
        };
        self.process_input(&plan, input, now);
        self.plan = Some(plan);
    }

    fn process_input(&mut self, plan: &FramePlan, input: &PointerInput, now: f64) {
        if input.hover.is_some() {
            self.last_pointer = input.hover;
        }

        if input.is_zooming()
            && let Some(anchor) = input.hover
        {
            let pinch = if input.zoom_factor > 0.0 {
                input.zoom_factor
            } else {
                1.0
            };
            let factor = (input.scroll * self.config.interaction.wheel_zoom_speed).exp() * pinch;
            if self.viewport.zoom_by(factor, anchor) {
                self.labels.note_zoom_gesture(now);
            }
        }

        if let Some(button) = input.pressed
            && let Some(point) = input.hover
        {
            self.press(plan, button, point, input.modifiers);
        }

        if input.primary_down
            && let Some(point) = input.hover
        {
            self.drag_to(plan, point, input.modifiers);
        }

        let lost_primary = !input.primary_down && self.gesture.holds_primary();
        if input.released.is_some() || lost_primary {
            self.release(plan, input.modifiers);
        }

        if matches!(self.gesture, Gesture::Idle) {
            self.update_hover(plan, input.hover);
        }
    }

    fn pointer_info(&self, screen: Pos2, button: PointerButton, modifiers: Modifiers) -> PointerInfo {
        PointerInfo {
            screen,
            world: self.viewport.screen_to_world(screen),
            button,
            modifiers,
        }
    }

    fn press(&mut self, plan: &FramePlan, button: PointerButton, point: Pos2, modifiers: Modifiers) {
        let hit = hit_test(plan, point, self.config.interaction.edge_pick_tolerance);
        let marquee = button == PointerButton::Primary
            && !matches!(hit, Hit::Node(_))
            && (self.selection_tool.is_some() || modifiers.shift);
        self.gesture = if marquee {
            Gesture::Selecting(SelectionGesture::begin(
                self.selection_tool.unwrap_or_default(),
                self.containment,
                point,
            ))
        } else {
            Gesture::Pressed {
                hit,
                origin: point,
                button,
            }
        };
    }

    fn drag_to(&mut self, plan: &FramePlan, point: Pos2, modifiers: Modifiers) {
        let threshold = self.config.interaction.drag_threshold;
        match &mut self.gesture {
            Gesture::Pressed {
                hit,
                origin,
                button: PointerButton::Primary,
            } => {
                if !exceeds_drag_threshold(*origin, point, threshold) {
                    return;
                }
                let (hit, origin) = (*hit, *origin);
                match hit {
                    Hit::Node(index) => self.start_drag(index, origin, point, modifiers),
                    Hit::Edge(_) | Hit::Background => {
                        self.gesture = Gesture::Panning { last: origin };
                        self.pan_to(point);
                    }
                }
            }
            Gesture::DraggingNode { index, grab } => {
                let (index, grab) = (*index, *grab);
                let target = self.viewport.screen_to_world(point) + grab;
                if self.graph.position(index) != Some(target) {
                    self.graph.pin(index, target);
                    if let Some(node) = self.graph.node(index) {
                        let node = node.id.clone();
                        let pointer = self.pointer_info(point, PointerButton::Primary, modifiers);
                        self.events.emit(GraphEvent::DragMove { node, pointer });
                    }
                }
            }
            Gesture::Panning { .. } => self.pan_to(point),
            Gesture::Selecting(gesture) => {
                gesture.extend(point);
                let hit_size = self.config.interaction.hit_box_size;
                if let Some(ids) = gesture.update(&self.graph, &plan.screen, hit_size)
                    && self.highlight.set_selected(&self.graph, ids)
                {
                    self.highlight.set_focused(None);
                    self.emit_selection();
                }
            }
            Gesture::Idle | Gesture::Pressed { .. } => {}
        }
    }

    fn start_drag(&mut self, index: usize, origin: Pos2, point: Pos2, modifiers: Modifiers) {
        let Some(position) = self.graph.position(index) else {
            return;
        };
        let grab = position - self.viewport.screen_to_world(origin);
        self.viewport.set_drag_lock(true);
        if self.config.layout_mode == LayoutMode::Force && !self.coordinator.is_running() {
            if self.layout_size == Vec2::ZERO
                && let Some(canvas) = self.viewport.canvas()
            {
                self.layout_size = canvas.size();
            }
            self.graph.clear_pins();
            self.simulation.reheat();
        }
        self.graph
            .pin(index, self.viewport.screen_to_world(point) + grab);
        self.gesture = Gesture::DraggingNode { index, grab };

        if let Some(node) = self.graph.node(index) {
            let node = node.id.clone();
            let pointer = self.pointer_info(point, PointerButton::Primary, modifiers);
            self.events.emit(GraphEvent::DragStart { node, pointer });
        }
    }

    fn gesture_is_drag(&self) -> bool {
        matches!(self.gesture, Gesture::DraggingNode { .. })
    }

    /// Ends a node drag. In force mode the node is released back into the simulation;
    /// other modes keep it pinned where it was dropped.
    fn end_drag(&mut self) -> Option<usize> {
        let Gesture::DraggingNode { index, .. } = self.gesture else {
            return None;
        };
        self.gesture = Gesture::Idle;
        self.viewport.set_drag_lock(false);
        if self.config.layout_mode == LayoutMode::Force {
            self.graph.unpin(index);
            self.simulation.cool();
        }
        Some(index)
    }

    fn pan_to(&mut self, point: Pos2) {
        if let Gesture::Panning { last } = &mut self.gesture {
            let delta = point - *last;
            *last = point;
            self.viewport.pan_by(delta);
        }
    }

    fn release(&mut self, plan: &FramePlan, modifiers: Modifiers) {
        let point = self.last_pointer;
        if self.gesture_is_drag() {
            if let Some(index) = self.end_drag()
                && let Some(node) = self.graph.node(index)
            {
                let node = node.id.clone();
                let screen = point.unwrap_or_else(|| {
                    let world = self.graph.position(index).unwrap_or_default();
                    self.viewport.world_to_screen(world)
                });
                let pointer = self.pointer_info(screen, PointerButton::Primary, modifiers);
                self.events.emit(GraphEvent::DragEnd { node, pointer });
            }
            return;
        }

        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Pressed {
                hit,
                origin,
                button,
            } => self.click(hit, point.unwrap_or(origin), button, modifiers),
            Gesture::Selecting(gesture) => {
                let result = gesture.finish(
                    &self.graph,
                    &plan.screen,
                    self.config.interaction.hit_box_size,
                );
                let previous_focus = self.highlight.focused().map(str::to_owned);
                let changed = self.highlight.set_selected(&self.graph, result.ids);
                self.highlight.set_focused(result.focused);
                if changed || previous_focus.as_deref() != self.highlight.focused() {
                    self.emit_selection();
                }
            }
            Gesture::Idle | Gesture::Panning { .. } | Gesture::DraggingNode { .. } => {}
        }
    }

    fn click(&mut self, hit: Hit, point: Pos2, button: PointerButton, modifiers: Modifiers) {
        let target = click_target(&self.graph, hit);
        let pointer = self.pointer_info(point, button, modifiers);
        self.events.emit(GraphEvent::Click {
            target: target.clone(),
            pointer,
        });
        if button != PointerButton::Primary {
            return;
        }

        let changed = match &target {
            ClickTarget::Node { id } if modifiers.command || modifiers.shift => {
                self.highlight.toggle_selected(&self.graph, id)
            }
            ClickTarget::Node { id } => self.highlight.set_selected(&self.graph, [id.clone()]),
            ClickTarget::Background => self.highlight.set_selected(&self.graph, []),
            ClickTarget::Edge { .. } => false,
        };
        if changed {
            self.focus_single_selection();
            self.emit_selection();
        }
    }

    fn update_hover(&mut self, plan: &FramePlan, point: Option<Pos2>) {
        let hovered = point.and_then(|point| {
            match hit_test(plan, point, self.config.interaction.edge_pick_tolerance) {
                Hit::Node(index) => Some(index),
                Hit::Edge(_) | Hit::Background => None,
            }
        });
        if self.highlight.set_hovered(&self.graph, hovered) {
            self.labels.invalidate();
            let node = hovered
                .and_then(|index| self.graph.node(index))
                .map(|node| node.id.clone());
            self.events.emit(GraphEvent::Hover { node });
        }
    }
}

fn label_anchor(plan: &FramePlan, index: usize) -> Option<Pos2> {
    let center = plan.screen.get(index)?;
    let radius = plan.radii.get(index)?;
    Some(pos2(center.x, center.y + radius + LABEL_GAP))
}

/// Visible nodes that may carry a label this frame. Below the label tier only selected
/// and highlighted nodes qualify.
fn label_candidates(
    graph: &GraphModel,
    highlight: &HighlightState,
    plan: &FramePlan,
    config: &EngineConfig,
) -> Vec<LabelCandidate> {
    let all = plan.tier.shows_labels();
    plan.nodes
        .iter()
        .filter_map(|draw| {
            let node = graph.node(draw.index)?;
            let forced =
                highlight.is_selected(&node.id) || highlight.is_node_highlighted(draw.index);
            if !all && !forced {
                return None;
            }
            let text = short_label(&node.label, config.labels.max_chars);
            Some(LabelCandidate {
                index: draw.index,
                anchor: label_anchor(plan, draw.index)?,
                size: estimate_size(&text, &config.labels),
                degree: graph.degree(draw.index),
                forced,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;

    const CANVAS: Rect = Rect {
        min: Pos2::ZERO,
        max: Pos2 { x: 800.0, y: 600.0 },
    };

    fn view(mode: LayoutMode) -> GraphView {
        let config = EngineConfig {
            layout_mode: mode,
            ..EngineConfig::default()
        };
        let mut view = GraphView::new(config, None);
        view.update(CANVAS, 0.0).expect("empty frame");
        view
    }

    fn triangle() -> (Vec<NodeInput>, Vec<EdgeInput>) {
        (
            vec![
                NodeInput::new("a", "person", "Alice"),
                NodeInput::new("b", "person", "Bob"),
                NodeInput::new("c", "company", "Acme"),
            ],
            vec![
                EdgeInput::new("a", "b"),
                EdgeInput::new("b", "c"),
                EdgeInput::new("c", "a"),
            ],
        )
    }

    fn loaded(mode: LayoutMode) -> GraphView {
        let mut view = view(mode);
        let (nodes, edges) = triangle();
        view.set_data(&nodes, &edges);
        // Let the fit animation finish.
        view.update(CANVAS, 1.0).expect("frame");
        view.update(CANVAS, 2.0).expect("frame");
        view
    }

    fn screen_of(view: &GraphView, id: &str) -> Pos2 {
        let index = view.graph().index_of(id).expect("node exists");
        view.world_to_screen(view.graph().position(index).expect("position"))
    }

    fn press(at: Pos2) -> PointerInput {
        PointerInput {
            hover: Some(at),
            pressed: Some(PointerButton::Primary),
            primary_down: true,
            zoom_factor: 1.0,
            ..PointerInput::default()
        }
    }

    fn hold(at: Pos2) -> PointerInput {
        PointerInput {
            hover: Some(at),
            primary_down: true,
            zoom_factor: 1.0,
            ..PointerInput::default()
        }
    }

    fn release(at: Pos2) -> PointerInput {
        PointerInput {
            hover: Some(at),
            released: Some(PointerButton::Primary),
            zoom_factor: 1.0,
            ..PointerInput::default()
        }
    }

    fn drag(view: &mut GraphView, from: Pos2, to: Pos2) {
        view.handle_input(&press(from), 3.0);
        view.handle_input(&hold(from + vec2(10.0, 0.0)), 3.1);
        view.handle_input(&hold(to), 3.2);
        view.handle_input(&release(to), 3.3);
    }

    #[test]
    fn layout_waits_for_canvas_size() {
        let mut view = GraphView::new(EngineConfig::default(), None);
        let (nodes, edges) = triangle();
        view.set_data(&nodes, &edges);
        assert!(view.graph().bodies().iter().all(|body| body.fixed.is_none()));

        view.update(CANVAS, 0.0).expect("frame");
        assert!(view.graph().bodies().iter().all(|body| body.fixed.is_some()));
    }

    #[test]
    fn release_unpins_only_in_force_mode() {
        for (mode, stays_pinned) in [
            (LayoutMode::Force, false),
            (LayoutMode::Grid, true),
            (LayoutMode::Hierarchy, true),
        ] {
            let mut view = loaded(mode);
            let events = view.subscribe();
            let from = screen_of(&view, "a");
            let to = from + vec2(60.0, 40.0);
            drag(&mut view, from, to);

            let body = view.graph().bodies()[0];
            assert_eq!(body.fixed.is_some(), stays_pinned, "{mode:?}");
            assert!(!view.viewport().is_drag_locked());

            let kinds = events
                .try_iter()
                .filter_map(|event| match event {
                    GraphEvent::DragStart { .. } => Some("start"),
                    GraphEvent::DragEnd { .. } => Some("end"),
                    _ => None,
                })
                .collect::<Vec<_>>();
            assert_eq!(kinds, vec!["start", "end"], "{mode:?}");
        }
    }

    #[test]
    fn dragged_node_follows_pointer_and_locks_viewport() {
        let mut view = loaded(LayoutMode::Grid);
        let from = screen_of(&view, "b");
        let before = view.transform();
        view.handle_input(&press(from), 3.0);
        view.handle_input(&hold(from + vec2(30.0, 0.0)), 3.1);

        assert!(view.viewport().is_drag_locked());
        assert!(!view.zoom_in());
        let moved = screen_of(&view, "b");
        assert!((moved.x - (from.x + 30.0)).abs() < 0.01);
        assert_eq!(view.transform(), before);
    }

    #[test]
    fn click_selects_and_focuses_once() {
        let mut view = loaded(LayoutMode::Grid);
        let events = view.subscribe();
        let at = screen_of(&view, "c");
        view.handle_input(&press(at), 3.0);
        view.handle_input(&release(at), 3.1);
        view.handle_input(&press(at), 3.2);
        view.handle_input(&release(at), 3.3);

        assert_eq!(view.selected_ids(), vec!["c".to_owned()]);
        assert_eq!(view.focused_node(), Some("c"));
        let selections = events
            .try_iter()
            .filter(|event| matches!(event, GraphEvent::SelectionChanged { .. }))
            .count();
        assert_eq!(selections, 1);
    }

    #[test]
    fn background_drag_pans() {
        let mut view = loaded(LayoutMode::Grid);
        let before = view.transform();
        let empty = pos2(5.0, 595.0);
        drag(&mut view, empty, empty + vec2(-20.0, -50.0));
        let after = view.transform();
        assert!((after.x - before.x + 20.0).abs() < 0.01);
        assert!((after.y - before.y + 50.0).abs() < 0.01);
        assert!(view.selected_ids().is_empty());
    }

    #[test]
    fn rectangle_marquee_selects_covered_nodes() {
        let mut view = loaded(LayoutMode::Grid);
        view.set_selection_tool(Some(SelectionTool::Rectangle));
        drag(&mut view, pos2(1.0, 1.0), pos2(799.0, 599.0));
        assert_eq!(view.selected_ids().len(), 3);
        assert_eq!(view.focused_node(), None);
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let mut view = loaded(LayoutMode::Grid);
        for step in 0..40 {
            view.handle_input(
                &PointerInput {
                    hover: Some(pos2(400.0, 300.0)),
                    scroll: 4000.0,
                    zoom_factor: 1.0,
                    ..PointerInput::default()
                },
                4.0 + step as f64 * 0.01,
            );
        }
        assert_eq!(view.transform().k, crate::viewport::MAX_ZOOM);
    }

    #[test]
    fn labels_are_suspended_while_zooming() {
        let mut view = loaded(LayoutMode::Grid);
        assert!(view.update(CANVAS, 3.0).expect("frame").labels > 0);
        view.handle_input(
            &PointerInput {
                hover: Some(pos2(400.0, 300.0)),
                scroll: 50.0,
                zoom_factor: 1.0,
                ..PointerInput::default()
            },
            4.0,
        );
        assert_eq!(view.update(CANVAS, 4.05).expect("frame").labels, 0);
        assert!(view.update(CANVAS, 5.0).expect("frame").labels > 0);
    }

    #[test]
    fn non_finite_positions_halt_animation_once() {
        let mut view = loaded(LayoutMode::Force);
        view.graph.bodies_mut()[1].pos = vec2(f32::NAN, 0.0);
        assert!(matches!(view.update(CANVAS, 3.0), Err(FrameError::NonFinite)));
        assert!(view.is_halted());
        assert!(view.update(CANVAS, 3.1).is_ok());

        view.graph.bodies_mut()[1].pos = vec2(10.0, 10.0);
        view.resume();
        assert!(view.update(CANVAS, 3.2).is_ok());
        assert!(!view.is_halted());
    }

    #[test]
    fn planning_panic_is_reported_once_and_latched() {
        let mut view = loaded(LayoutMode::Force);
        let planned = view.update(CANVAS, 3.0).expect("frame").visible_nodes;

        view.fail_planning = true;
        let error = view.update(CANVAS, 3.1).expect_err("planning panics");
        assert!(matches!(&error, FrameError::Panicked(message) if message == "planning failed"));
        assert!(view.is_halted());

        let stats = view.update(CANVAS, 3.2).expect("later frames stay quiet");
        assert!(!stats.animating);
        assert_eq!(stats.visible_nodes, planned);

        view.fail_planning = false;
        view.resume();
        assert!(view.update(CANVAS, 3.3).is_ok());
        assert!(!view.is_halted());
    }

    #[test]
    fn search_highlights_fuzzy_matches() {
        let mut view = loaded(LayoutMode::Grid);
        assert_eq!(view.set_search("acm"), 1);
        assert!(view.highlight().is_node_highlighted(2));
        assert_eq!(view.set_search(""), 0);
        assert!(!view.highlight().is_active());
    }

    #[test]
    fn new_data_keeps_existing_positions() {
        let mut view = loaded(LayoutMode::Grid);
        let before = view.graph().position(0).expect("a placed");
        let (mut nodes, edges) = triangle();
        nodes.push(NodeInput::new("d", "person", "Dana"));
        let summary = view.set_data(&nodes, &edges);
        assert_eq!(summary.new_nodes, 1);
        assert_eq!(view.graph().position(0), Some(before));
        assert!(view.graph().bodies()[3].fixed.is_some());
    }
}
