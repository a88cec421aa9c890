//! Shared icon cache. Icons are identified by `/icons/<type>.svg` and decoded by an
//! injected [`IconSource`] on a background thread; callers render without an icon until
//! it is ready.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IconError {
    #[error("icon `{0}` not found")]
    NotFound(String),
    #[error("icon `{path}` could not be decoded: {reason}")]
    Decode { path: String, reason: String },
    #[error("icon `{path}` could not be read")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Decoded RGBA8 pixels, not premultiplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IconImage {
    pub size: [usize; 2],
    pub rgba: Vec<u8>,
}

/// Resolves an icon identifier to pixels. Called off the UI thread.
pub trait IconSource: Send + Sync + 'static {
    fn load(&self, path: &str) -> Result<IconImage, IconError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconStatus {
    Unrequested,
    Loading,
    Ready,
    Failed,
}

enum Slot {
    Loading,
    Ready(Arc<IconImage>),
    Failed,
}

type RepaintHook = Box<dyn Fn() + Send + Sync>;

struct Inner {
    source: Box<dyn IconSource>,
    slots: Mutex<HashMap<String, Slot>>,
    revision: AtomicU64,
    /// Bumped by `clear`; loads started under an older epoch are discarded.
    epoch: AtomicU64,
    repaint: Mutex<Option<RepaintHook>>,
}

impl Inner {
    fn finish(&self, key: &str, epoch: u64, result: Result<IconImage, IconError>) {
        {
            let mut slots = self.slots.lock();
            if self.epoch.load(Ordering::Acquire) != epoch {
                log::debug!("dropping icon `{key}` loaded before the cache was cleared");
                return;
            }
            let Some(slot) = slots.get_mut(key) else {
                return;
            };
            if !matches!(slot, Slot::Loading) {
                return;
            }
            *slot = match result {
                Ok(image) => Slot::Ready(Arc::new(image)),
                Err(error) => {
                    log::warn!("{error}");
                    Slot::Failed
                }
            };
            self.revision.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(repaint) = self.repaint.lock().as_ref() {
            repaint();
        }
    }
}

/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct IconCache {
    inner: Arc<Inner>,
}

pub fn icon_path(node_type: &str) -> String {
    let name = node_type
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    format!("/icons/{name}.svg")
}

impl IconCache {
    pub fn new(source: impl IconSource) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: Box::new(source),
                slots: Mutex::new(HashMap::new()),
                revision: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                repaint: Mutex::new(None),
            }),
        }
    }

    /// Called after every finished load, from the loading thread.
    pub fn set_repaint_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.inner.repaint.lock() = Some(Box::new(hook));
    }

    /// Bumped whenever a load finishes.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Relaxed)
    }

    /// Returns the icon for `node_type` if it is ready, starting a load the first time
    /// it is asked for.
    pub fn get(&self, node_type: &str) -> Option<Arc<IconImage>> {
        let key = icon_path(node_type);
        let mut slots = self.inner.slots.lock();
        match slots.get(&key) {
            Some(Slot::Ready(image)) => return Some(Arc::clone(image)),
            Some(Slot::Loading | Slot::Failed) => return None,
            None => {}
        }
        slots.insert(key.clone(), Slot::Loading);
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        drop(slots);

        self.spawn_load(key, epoch);
        None
    }

    pub fn status(&self, node_type: &str) -> IconStatus {
        match self.inner.slots.lock().get(&icon_path(node_type)) {
            None => IconStatus::Unrequested,
            Some(Slot::Loading) => IconStatus::Loading,
            Some(Slot::Ready(_)) => IconStatus::Ready,
            Some(Slot::Failed) => IconStatus::Failed,
        }
    }

    /// Forgets every icon, including failures, so the next `get` retries.
    pub fn clear(&self) {
        let mut slots = self.inner.slots.lock();
        slots.clear();
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        drop(slots);
        self.inner.revision.fetch_add(1, Ordering::Relaxed);
    }

    fn spawn_load(&self, key: String, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        let thread_key = key.clone();
        let spawned = thread::Builder::new()
            .name("icon-load".to_owned())
            .spawn(move || {
                let result = inner.source.load(&thread_key);
                inner.finish(&thread_key, epoch, result);
            });

        if let Err(error) = spawned {
            self.inner.finish(
                &key,
                epoch,
                Err(IconError::Io {
                    path: key.clone(),
                    source: error,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    use super::*;

    struct CountingSource {
        loads: Arc<AtomicUsize>,
    }

    impl IconSource for CountingSource {
        fn load(&self, path: &str) -> Result<IconImage, IconError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            if path.contains("missing") {
                return Err(IconError::NotFound(path.to_owned()));
            }
            Ok(IconImage {
                size: [1, 1],
                rgba: vec![255, 0, 0, 255],
            })
        }
    }

    fn cache() -> (IconCache, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = IconCache::new(CountingSource {
            loads: Arc::clone(&loads),
        });
        (cache, loads)
    }

    fn wait_until(cache: &IconCache, node_type: &str, status: IconStatus) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while cache.status(node_type) != status && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(cache.status(node_type), status);
    }

    #[test]
    fn icon_paths_are_sanitised() {
        assert_eq!(icon_path("person"), "/icons/person.svg");
        assert_eq!(icon_path("Bank Account"), "/icons/bank_account.svg");
        assert_eq!(icon_path("../etc"), "/icons/___etc.svg");
    }

    #[test]
    fn concurrent_requests_share_one_load() {
        let (cache, loads) = cache();
        assert!(cache.get("person").is_none());
        assert!(cache.get("person").is_none());
        cache.clone().get("person");
        wait_until(&cache, "person", IconStatus::Ready);

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.get("person").is_some());
        assert_eq!(cache.revision(), 1);
    }

    #[test]
    fn failures_are_remembered_quietly() {
        let (cache, loads) = cache();
        assert!(cache.get("missing").is_none());
        wait_until(&cache, "missing", IconStatus::Failed);
        assert!(cache.get("missing").is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn results_arriving_after_clear_are_dropped() {
        let (cache, _) = cache();
        cache.get("device");
        cache.clear();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.status("device"), IconStatus::Unrequested);
    }

    /// Fails its first load slowly, then succeeds.
    struct FlakySource {
        calls: AtomicUsize,
    }

    impl IconSource for FlakySource {
        fn load(&self, path: &str) -> Result<IconImage, IconError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_millis(60));
                return Err(IconError::NotFound(path.to_owned()));
            }
            thread::sleep(Duration::from_millis(200));
            Ok(IconImage {
                size: [1, 1],
                rgba: vec![0, 0, 255, 255],
            })
        }
    }

    #[test]
    fn load_from_before_clear_cannot_overwrite_a_fresh_request() {
        let cache = IconCache::new(FlakySource {
            calls: AtomicUsize::new(0),
        });
        cache.get("person");
        cache.clear();
        cache.get("person");

        thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.status("person"), IconStatus::Loading);
        wait_until(&cache, "person", IconStatus::Ready);
        assert!(cache.get("person").is_some());
    }

    #[test]
    fn repaint_hook_fires() {
        let (cache, _) = cache();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        cache.set_repaint_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cache.get("account");
        wait_until(&cache, "account", IconStatus::Ready);
        let deadline = Instant::now() + Duration::from_secs(5);
        while fired.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
