use std::collections::VecDeque;

use eframe::egui::{self, Align, Align2, Context, Frame, Layout, vec2};
use linkchart::GraphView;
use linkchart::icons::IconCache;

use super::super::loader::{Launch, LoadedGraph};
use super::super::{Toast, Workspace};
use super::fps::FpsCounter;

const TOAST_SECS: f64 = 4.0;
const MAX_TOASTS: usize = 4;

impl Workspace {
    pub(in crate::app) const INITIAL_NEIGHBOR_ROWS: usize = 24;
    pub(in crate::app) const NEIGHBOR_PAGE_ROWS: usize = 24;

    /// `now` is the frame time the workspace first appears at, so startup toasts get
    /// their full display time however long loading took.
    pub(in crate::app) fn new(loaded: LoadedGraph, icons: Option<IconCache>, now: f64) -> Self {
        let mut view = GraphView::new(loaded.config, icons);
        let events = view.subscribe();
        let summary = view.set_data(&loaded.nodes, &loaded.edges);
        let mut workspace = Self {
            view,
            events,
            search: String::new(),
            search_matches: 0,
            show_fps_bar: true,
            fps: FpsCounter::default(),
            stats: None,
            toasts: VecDeque::new(),
            last_event: None,
            neighbor_rows_visible: Self::INITIAL_NEIGHBOR_ROWS,
        };
        if summary.dropped_edges > 0 {
            workspace.push_toast(
                format!("Skipped {} edge(s) with unknown endpoints", summary.dropped_edges),
                now,
            );
        }
        workspace
    }

    pub(in crate::app) fn reload(
        &mut self,
        loaded: LoadedGraph,
        icons: Option<IconCache>,
        now: f64,
    ) {
        if let Some(icons) = &icons {
            icons.clear();
        }
        self.view.set_icon_cache(icons);
        let summary = self.view.set_data(&loaded.nodes, &loaded.edges);
        self.push_toast(
            format!(
                "Reloaded: {} nodes, {} edges ({} new)",
                summary.nodes, summary.edges, summary.new_nodes
            ),
            now,
        );
    }

    pub(in crate::app) fn push_toast(&mut self, text: String, now: f64) {
        if self.toasts.back().is_some_and(|toast| toast.text == text) {
            return;
        }
        self.toasts.push_back(Toast {
            text,
            expires_at: now + TOAST_SECS,
        });
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        launch: &Launch,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        self.fps.update(ctx);
        let now = ctx.input(|input| input.time);
        for notice in self.view.take_notices() {
            self.push_toast(notice, now);
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("linkchart");
                    ui.separator();
                    ui.label(format!("file: {}", launch.graph_path.display()));
                    ui.label(format!("nodes: {}", self.view.graph().node_count()));
                    ui.label(format!("edges: {}", self.view.graph().edge_count()));
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload graph"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(stats) = &self.stats {
                            ui.label(format!(
                                "visible: {} nodes / {} edges | {} labels | {} @ {:.2}x",
                                stats.visible_nodes,
                                stats.visible_edges,
                                stats.labels,
                                stats.tier.label(),
                                stats.zoom
                            ));
                        }
                        if self.show_fps_bar {
                            ui.label(self.fps.text());
                        }
                    });
                });
            });

        egui::TopBottomPanel::bottom("status_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    match &self.last_event {
                        Some(text) => ui.label(text.as_str()),
                        None => ui.weak("Click, drag or lasso nodes to interact."),
                    };
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_controls(ui, now));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(Frame::NONE)
            .show(ctx, |ui| self.draw_canvas(ui));

        self.drain_events();
        self.show_toasts(ctx, now);
    }

    fn show_toasts(&mut self, ctx: &Context, now: f64) {
        self.toasts.retain(|toast| toast.expires_at > now);
        if self.toasts.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(Align2::RIGHT_BOTTOM, vec2(-16.0, -40.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    Frame::popup(ui.style()).show(ui, |ui| {
                        ui.label(toast.text.as_str());
                    });
                }
            });

        let next_expiry = self
            .toasts
            .iter()
            .map(|toast| toast.expires_at - now)
            .fold(TOAST_SECS, f64::min)
            .max(0.05);
        ctx.request_repaint_after(std::time::Duration::from_secs_f64(next_expiry));
    }
}
