use std::sync::atomic::AtomicBool;
use std::sync::mpsc::TryRecvError;

use crate::config::LayoutMode;
use crate::graph::GraphModel;

use super::worker::{LayoutEvent, LayoutJob, spawn_layout};
use super::{LayoutError, LayoutInput, LayoutOptions, LayoutProgress, LayoutResult, compute_layout};

/// What `regenerate` did right away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutTicket {
    /// Laid out on the calling thread; positions are already applied.
    Completed { generation: u64, applied: usize },
    /// Running on a worker; watch `poll` for the outcome.
    Pending { generation: u64 },
}

impl LayoutTicket {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Completed { generation, .. } | Self::Pending { generation } => *generation,
        }
    }
}

#[derive(Debug)]
pub enum LayoutOutcome {
    Progress {
        generation: u64,
        progress: LayoutProgress,
    },
    Completed {
        generation: u64,
        mode: LayoutMode,
        applied: usize,
    },
    Failed {
        generation: u64,
        error: LayoutError,
    },
}

/// Runs layout passes and merges their results onto the live graph. Every request gets
/// a new generation; results from older generations are dropped on arrival.
pub struct LayoutCoordinator {
    generation: u64,
    worker_threshold: usize,
    job: Option<LayoutJob>,
    progress: Option<LayoutProgress>,
}

impl LayoutCoordinator {
    pub fn new(worker_threshold: usize) -> Self {
        Self {
            generation: 0,
            worker_threshold,
            job: None,
            progress: None,
        }
    }

    pub fn set_worker_threshold(&mut self, worker_threshold: usize) {
        self.worker_threshold = worker_threshold;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.job.is_some()
    }

    pub fn progress(&self) -> Option<LayoutProgress> {
        self.progress
    }

    /// Clears every pin, lays the graph out under `options.mode` and pins every node
    /// where it settled. On failure the previous positions are kept and re-pinned.
    pub fn regenerate(
        &mut self,
        graph: &mut GraphModel,
        options: LayoutOptions,
    ) -> Result<LayoutTicket, LayoutError> {
        graph.clear_pins();
        self.start(graph, options)
    }

    /// Lays out only the nodes that are not pinned, such as nodes added by a data
    /// update, then pins everything like `regenerate`.
    pub fn place_unpinned(
        &mut self,
        graph: &mut GraphModel,
        options: LayoutOptions,
    ) -> Result<LayoutTicket, LayoutError> {
        self.start(graph, options)
    }

    fn start(
        &mut self,
        graph: &mut GraphModel,
        options: LayoutOptions,
    ) -> Result<LayoutTicket, LayoutError> {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        let input = LayoutInput::snapshot(graph);
        let offload = options.mode != LayoutMode::Grid && input.len() > self.worker_threshold;
        log::info!(
            "layout #{generation}: {} over {} nodes{}",
            options.mode.label(),
            input.len(),
            if offload { " on worker" } else { "" }
        );

        if offload {
            return match spawn_layout(generation, input, options) {
                Ok(job) => {
                    self.job = Some(job);
                    Ok(LayoutTicket::Pending { generation })
                }
                Err(error) => {
                    log::warn!("layout #{generation}: {error}");
                    graph.pin_all();
                    Err(error)
                }
            };
        }

        let cancel = AtomicBool::new(false);
        match compute_layout(input, &options, &cancel, |_| {}) {
            Ok(result) => Ok(LayoutTicket::Completed {
                generation,
                applied: Self::settle(graph, &result),
            }),
            Err(error) => {
                log::warn!("layout #{generation}: {error}");
                graph.pin_all();
                Err(error)
            }
        }
    }

    /// Drains worker messages. Call once per frame before rendering.
    pub fn poll(&mut self, graph: &mut GraphModel) -> Vec<LayoutOutcome> {
        let Some(job) = self.job.take() else {
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        let mut finished = false;
        loop {
            match job.rx.try_recv() {
                Ok(event) => {
                    let terminal = !matches!(event, LayoutEvent::Progress { .. });
                    outcomes.extend(self.accept(graph, event));
                    if terminal {
                        finished = true;
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    finished = true;
                    log::warn!("layout #{}: worker disconnected", job.generation);
                    self.progress = None;
                    graph.pin_all();
                    outcomes.push(LayoutOutcome::Failed {
                        generation: job.generation,
                        error: LayoutError::Unavailable("layout worker disconnected".to_owned()),
                    });
                    break;
                }
            }
        }

        if !finished {
            self.job = Some(job);
        }
        outcomes
    }

    /// Stops the in-flight run. Its late messages are never applied.
    pub fn cancel(&mut self) {
        if let Some(job) = self.job.take() {
            log::debug!("layout #{}: cancelled", job.generation);
            job.cancel();
        }
        self.progress = None;
    }

    fn accept(&mut self, graph: &mut GraphModel, event: LayoutEvent) -> Option<LayoutOutcome> {
        let generation = event.generation();
        if generation != self.generation {
            log::debug!(
                "discarding layout message from #{generation}, current is #{}",
                self.generation
            );
            return None;
        }

        match event {
            LayoutEvent::Progress { progress, .. } => {
                self.progress = Some(progress);
                Some(LayoutOutcome::Progress {
                    generation,
                    progress,
                })
            }
            LayoutEvent::Complete { result, .. } => {
                self.progress = None;
                let applied = Self::settle(graph, &result);
                log::info!(
                    "layout #{generation}: applied {applied} positions after {} iterations",
                    result.iterations
                );
                Some(LayoutOutcome::Completed {
                    generation,
                    mode: result.mode,
                    applied,
                })
            }
            LayoutEvent::Failed { error, .. } => {
                self.progress = None;
                log::warn!("layout #{generation}: {error}");
                graph.pin_all();
                Some(LayoutOutcome::Failed { generation, error })
            }
        }
    }

    fn settle(graph: &mut GraphModel, result: &LayoutResult) -> usize {
        let applied = graph.apply_positions(
            result
                .positions
                .iter()
                .map(|(id, pos)| (id.as_str(), *pos)),
        );
        graph.pin_all();
        applied
    }
}
