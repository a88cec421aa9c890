use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context};
use linkchart::GraphView;
use linkchart::icons::IconCache;
use linkchart::interaction::GraphEvent;
use linkchart::view::FrameStats;

mod canvas;
mod events;
mod icons;
mod loader;
mod ui;

pub use loader::Launch;
use loader::LoadedGraph;

use icons::SvgIconSource;
use ui::fps::FpsCounter;

type LoadResult = Result<LoadedGraph, String>;

pub struct LinkChartApp {
    launch: Launch,
    icons: Option<IconCache>,
    state: AppState,
    reload_rx: Option<Receiver<LoadResult>>,
}

enum AppState {
    Loading { rx: Receiver<LoadResult> },
    Ready(Box<Workspace>),
    Error(String),
}

/// A loaded graph and the UI state around it.
struct Workspace {
    view: GraphView,
    events: Receiver<GraphEvent>,
    search: String,
    search_matches: usize,
    show_fps_bar: bool,
    fps: FpsCounter,
    stats: Option<FrameStats>,
    toasts: VecDeque<Toast>,
    last_event: Option<String>,
    neighbor_rows_visible: usize,
}

struct Toast {
    text: String,
    expires_at: f64,
}

impl LinkChartApp {
    pub fn new(cc: &eframe::CreationContext<'_>, launch: Launch) -> Self {
        let icons = launch.icon_dir.clone().map(|dir| {
            let cache = IconCache::new(SvgIconSource::new(dir));
            let ctx = cc.egui_ctx.clone();
            cache.set_repaint_hook(move || ctx.request_repaint());
            cache
        });
        let state = Self::start_load(launch.clone());
        Self {
            launch,
            icons,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(launch: Launch) -> Receiver<LoadResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = loader::load(&launch).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(launch: Launch) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(launch),
        }
    }
}

impl eframe::App for LinkChartApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(loaded)) => {
                        transition = Some(AppState::Ready(Box::new(Workspace::new(
                            loaded,
                            self.icons.clone(),
                            ctx.input(|input| input.time),
                        ))));
                    }
                    Ok(Err(error)) => transition = Some(AppState::Error(error)),
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        transition =
                            Some(AppState::Error("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.launch.clone()));
                    }
                });
            }
            AppState::Ready(workspace) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                workspace.show(ctx, &self.launch, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.launch.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        // Reloads merge into the live view so unchanged nodes stay put. Icons are
                        // read again from disk.
                        Ok(Ok(loaded)) => workspace.reload(
                            loaded,
                            self.icons.clone(),
                            ctx.input(|input| input.time),
                        ),
                        Ok(Err(error)) => {
                            workspace.push_toast(
                                format!("Reload failed: {error}"),
                                ctx.input(|input| input.time),
                            );
                        }
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(AppState::Error("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}
