//! Node placement. Grid and hierarchy are single deterministic passes; force runs a
//! cooling simulation. Large graphs are laid out on a worker thread by the coordinator.

use std::sync::atomic::{AtomicBool, Ordering};

use eframe::egui::Vec2;
use thiserror::Error;

use crate::config::{ForceConfig, LayoutMode};
use crate::graph::{Body, GraphModel};

mod coordinator;
mod force;
mod grid;
mod hierarchy;
mod worker;

pub use coordinator::{LayoutCoordinator, LayoutOutcome, LayoutTicket};
pub use force::ForceSimulation;
pub use grid::grid_positions;
pub use hierarchy::hierarchy_positions;
pub use worker::LayoutEvent;

#[derive(Debug, Error)]
pub enum LayoutError {
    /// The worker could not be started or went away without a result.
    #[error("layout unavailable: {0}")]
    Unavailable(String),
    #[error("layout failed: {0}")]
    Failed(String),
    /// Superseded by a newer request or torn down.
    #[error("layout cancelled")]
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutProgress {
    pub iteration: usize,
    pub total: usize,
    pub alpha: f32,
}

impl LayoutProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.iteration as f32 / self.total as f32).clamp(0.0, 1.0)
    }
}

/// Owned copy of everything a layout pass reads, so it can cross to a worker thread.
#[derive(Clone, Debug)]
pub struct LayoutInput {
    pub ids: Vec<String>,
    pub bodies: Vec<Body>,
    pub links: Vec<(usize, usize)>,
}

impl LayoutInput {
    pub fn snapshot(graph: &GraphModel) -> Self {
        Self {
            ids: graph.nodes().iter().map(|node| node.id.clone()).collect(),
            bodies: graph.bodies().to_vec(),
            links: graph.link_pairs(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutOptions {
    pub mode: LayoutMode,
    /// Viewport size; the layout fills `[0, size.x] x [0, size.y]` in world units.
    pub size: Vec2,
    pub force: ForceConfig,
}

#[derive(Clone, Debug)]
pub struct LayoutResult {
    pub mode: LayoutMode,
    pub positions: Vec<(String, Vec2)>,
    pub iterations: usize,
}

pub fn compute_layout(
    input: LayoutInput,
    options: &LayoutOptions,
    cancel: &AtomicBool,
    progress: impl FnMut(LayoutProgress),
) -> Result<LayoutResult, LayoutError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(LayoutError::Cancelled);
    }

    let LayoutInput {
        ids,
        mut bodies,
        links,
    } = input;
    let input_fixed = bodies
        .iter()
        .map(|body| body.fixed.is_some())
        .collect::<Vec<_>>();

    let (positions, iterations) = match options.mode {
        LayoutMode::Grid => (grid_positions(ids.len(), options.size), 0),
        LayoutMode::Hierarchy => (hierarchy_positions(ids.len(), &links, options.size), 0),
        LayoutMode::Force => {
            let mut simulation = ForceSimulation::new(options.force);
            let iterations =
                simulation.run(&mut bodies, &links, options.size * 0.5, cancel, progress)?;
            (bodies.iter().map(|body| body.pos).collect(), iterations)
        }
    };

    // Nodes pinned in the input keep their place; only free nodes are reported.
    let positions = ids
        .into_iter()
        .zip(positions)
        .zip(&input_fixed)
        .filter(|(_, fixed)| !**fixed)
        .map(|(entry, _)| entry)
        .collect();

    Ok(LayoutResult {
        mode: options.mode,
        positions,
        iterations,
    })
}
