use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use super::{LayoutError, LayoutInput, LayoutOptions, LayoutProgress, LayoutResult, compute_layout};

/// Messages from a layout run: any number of progress updates, then exactly one of
/// `Complete` or `Failed`.
#[derive(Debug)]
pub enum LayoutEvent {
    Progress {
        generation: u64,
        progress: LayoutProgress,
    },
    Complete {
        generation: u64,
        result: LayoutResult,
    },
    Failed {
        generation: u64,
        error: LayoutError,
    },
}

impl LayoutEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Progress { generation, .. }
            | Self::Complete { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }
}

pub(super) struct LayoutJob {
    pub(super) generation: u64,
    pub(super) rx: Receiver<LayoutEvent>,
    cancel: Arc<AtomicBool>,
}

impl LayoutJob {
    pub(super) fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for LayoutJob {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub(super) fn spawn_layout(
    generation: u64,
    input: LayoutInput,
    options: LayoutOptions,
) -> Result<LayoutJob, LayoutError> {
    let (tx, rx) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    thread::Builder::new()
        .name(format!("layout-{generation}"))
        .spawn(move || {
            let progress_tx = tx.clone();
            let result = compute_layout(input, &options, &worker_cancel, |progress| {
                let _ = progress_tx.send(LayoutEvent::Progress {
                    generation,
                    progress,
                });
            });

            let event = match result {
                Ok(result) => LayoutEvent::Complete { generation, result },
                Err(error) => LayoutEvent::Failed { generation, error },
            };
            let _ = tx.send(event);
        })
        .map_err(|error| LayoutError::Unavailable(error.to_string()))?;

    Ok(LayoutJob {
        generation,
        rx,
        cancel,
    })
}
