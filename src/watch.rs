// todo-plus/src/watch.rs

use anyhow::{Context, Result};
use notify::{recommended_watcher, Event, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Per-path coalescing: repeated hits inside the quiet window collapse into
/// one emission. There is no cancellation of in-flight consumers; a hit only
/// restarts the timer for its own path.
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl Debouncer {
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                window,
                pending: HashMap::new(),
                tx,
            },
            rx,
        )
    }

    pub fn hit(&mut self, path: PathBuf) {
        self.pending.retain(|_, handle| !handle.is_finished());
        if let Some(handle) = self.pending.remove(&path) {
            handle.abort();
        }
        let tx = self.tx.clone();
        let emit = path.clone();
        let window = self.window;
        self.pending.insert(
            path,
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                let _ = tx.send(emit);
            }),
        );
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

/// Watches a directory tree and yields paths that settled after a change.
/// The consumer decides what a change means (normally: re-scan that file);
/// correctness never depends on the edit delta, only on the trigger.
pub struct ScanTrigger {
    _watcher: notify::RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl ScanTrigger {
    /// Must be constructed inside a tokio runtime. `window` is the per-file
    /// debounce (settings default: 1000 ms).
    pub fn new(root: &Path, window: Duration) -> Result<Self> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<PathBuf>();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            if !matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_)
            ) {
                return;
            }
            for path in event.paths {
                let _ = raw_tx.send(path);
            }
        })
        .context("create file watcher")?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watch {}", root.display()))?;

        let (mut debouncer, rx) = Debouncer::new(window);
        tokio::spawn(async move {
            while let Some(path) = raw_rx.recv().await {
                debug!(path = %path.display(), "change event");
                debouncer.hit(path);
            }
        });
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// The next path whose changes settled. `None` when the watcher is gone.
    pub async fn next(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }
}
