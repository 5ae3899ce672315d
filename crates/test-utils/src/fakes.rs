use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use preview_live::index::{IndexEntry, Reindexer};
use preview_live::watch::{ChangeHandler, ChangeSet};

/// A change handler that forwards every change set it receives to a channel.
pub struct RecordingHandler {
    tx: mpsc::UnboundedSender<ChangeSet>,
}

impl RecordingHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ChangeSet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ChangeHandler for RecordingHandler {
    fn on_change(&self, changes: ChangeSet) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let _ = self.tx.send(changes);
        Box::pin(async {})
    }
}

/// A reindexer that:
/// - counts builds and tracks how many run at the same time
/// - sleeps for a configurable time to widen race windows
/// - can be switched to fail
///
/// Build `n` produces `entries` entries whose digest is `"build-n"`, so a
/// reader can tell whether a snapshot mixes two builds.
pub struct FakeReindexer {
    entries: usize,
    delay: Duration,
    fail: AtomicBool,
    builds: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeReindexer {
    pub fn new(entries: usize) -> Self {
        Self {
            entries,
            delay: Duration::ZERO,
            fail: AtomicBool::new(false),
            builds: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Highest number of builds observed running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Reindexer for FakeReindexer {
    fn reindex(&self) -> anyhow::Result<Vec<IndexEntry>> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let build = self.builds.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("fake reindex failure in build {build}");
        }

        Ok((0..self.entries)
            .map(|i| IndexEntry {
                source: "fake".to_string(),
                path: PathBuf::from(format!("/fake/{i}.rb")),
                digest: format!("build-{build}"),
            })
            .collect())
    }
}
