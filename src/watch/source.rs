// src/watch/source.rs

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config, Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::WatchError;
use crate::types::{ChangeKind, SourceName};
use crate::watch::changeset::{ChangeSet, Coalescer};
use crate::watch::filter::PathFilter;

/// Receiver of the change sets a [`WatchSource`] produces.
///
/// The source awaits each call before delivering the next change set, so a
/// handler sees the change sets of one source in emission order.
pub trait ChangeHandler: Send + Sync {
    fn on_change(&self, changes: ChangeSet) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Immutable description of a watch source.
#[derive(Debug, Clone)]
pub struct WatchSourceSpec {
    pub name: SourceName,
    pub roots: Vec<PathBuf>,
    pub filter: PathFilter,
    /// Use a polling watcher instead of the platform's native mechanism.
    pub polling: bool,
    pub poll_interval: Duration,
    /// Length of one debounce window.
    pub debounce: Duration,
    /// A window closes early once it has touched this many distinct paths.
    pub max_changeset_paths: usize,
}

/// One normalised filesystem notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Everything that only exists while a source is running.
struct RunningSource {
    watcher: Box<dyn Watcher + Send>,
    roots: Vec<PathBuf>,
    debounce_task: JoinHandle<()>,
    // Not aborted on stop: it exits by itself once the debounce task is gone,
    // after finishing any in-flight `on_change`.
    _dispatch_task: JoinHandle<()>,
}

impl Drop for RunningSource {
    fn drop(&mut self) {
        self.debounce_task.abort();
    }
}

/// A set of filesystem roots watched together, emitting debounced,
/// filtered [`ChangeSet`]s to a [`ChangeHandler`].
pub struct WatchSource {
    spec: WatchSourceSpec,
    running: Mutex<Option<RunningSource>>,
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSource")
            .field("name", &self.spec.name)
            .field("roots", &self.spec.roots)
            .field("running", &self.is_running())
            .finish()
    }
}

impl WatchSource {
    pub fn new(spec: WatchSourceSpec) -> Self {
        Self {
            spec,
            running: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &WatchSourceSpec {
        &self.spec
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Begin monitoring all roots.
    ///
    /// Fails synchronously if a root is missing or the watcher cannot be
    /// installed; nothing is retried. Must be called from within a tokio
    /// runtime, since the debounce and dispatch loops are spawned onto it.
    pub fn start(&self, handler: Arc<dyn ChangeHandler>) -> Result<(), WatchError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(WatchError::AlreadyStarted {
                source_name: self.spec.name.clone(),
            });
        }

        let mut roots = Vec::with_capacity(self.spec.roots.len());
        for root in &self.spec.roots {
            if !root.exists() {
                return Err(WatchError::MissingRoot {
                    source_name: self.spec.name.clone(),
                    root: root.clone(),
                });
            }
            // Canonicalize so event paths and roots share the same prefix.
            roots.push(root.canonicalize().unwrap_or_else(|_| root.clone()));
        }

        // Channel from the blocking notify callback into the async world.
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<RawChange>();
        let mut watcher = self.build_watcher(raw_tx)?;

        for root in &roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|cause| WatchError::Start {
                    source_name: self.spec.name.clone(),
                    root: root.clone(),
                    cause,
                })?;
        }

        let (changes_tx, changes_rx) = mpsc::channel::<ChangeSet>(16);

        let debounce_task = tokio::spawn(debounce_loop(
            self.spec.name.clone(),
            roots.clone(),
            self.spec.filter.clone(),
            self.spec.debounce,
            self.spec.max_changeset_paths,
            raw_rx,
            changes_tx,
        ));
        let dispatch_task = tokio::spawn(dispatch_loop(
            self.spec.name.clone(),
            changes_rx,
            handler,
        ));

        info!(
            source = %self.spec.name,
            ?roots,
            polling = self.spec.polling,
            debounce_ms = self.spec.debounce.as_millis() as u64,
            "watch source started"
        );

        *running = Some(RunningSource {
            watcher,
            roots,
            debounce_task,
            _dispatch_task: dispatch_task,
        });
        Ok(())
    }

    /// Stop monitoring.
    ///
    /// Cancels the debounce window (pending, not-yet-emitted events are
    /// discarded) and releases the watcher. A change set already handed to
    /// the handler is allowed to finish. Stopping a source that is not
    /// running is a no-op.
    pub fn stop(&self) -> Result<(), WatchError> {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut running) = taken else {
            debug!(source = %self.spec.name, "stop on idle watch source; nothing to do");
            return Ok(());
        };

        running.debounce_task.abort();

        let mut first_err = None;
        for root in &running.roots {
            if let Err(cause) = running.watcher.unwatch(root) {
                warn!(source = %self.spec.name, ?root, error = %cause, "failed to unwatch root");
                first_err.get_or_insert(cause);
            }
        }
        drop(running);

        info!(source = %self.spec.name, "watch source stopped");

        match first_err {
            Some(cause) => Err(WatchError::Stop {
                source_name: self.spec.name.clone(),
                cause,
            }),
            None => Ok(()),
        }
    }

    fn build_watcher(
        &self,
        raw_tx: mpsc::UnboundedSender<RawChange>,
    ) -> Result<Box<dyn Watcher + Send>, WatchError> {
        let source = self.spec.name.clone();
        let forward = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in raw_changes(&event) {
                    // Receiver gone means the source is stopping.
                    if raw_tx.send(change).is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(source = %source, error = %err, "file watch error");
            }
        };

        let init_err = |cause| WatchError::Init {
            source_name: self.spec.name.clone(),
            cause,
        };

        if self.spec.polling {
            let config = Config::default().with_poll_interval(self.spec.poll_interval);
            let watcher = PollWatcher::new(forward, config).map_err(init_err)?;
            Ok(Box::new(watcher))
        } else {
            let watcher = RecommendedWatcher::new(forward, Config::default()).map_err(init_err)?;
            Ok(Box::new(watcher))
        }
    }
}

impl Drop for WatchSource {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(err) = self.stop() {
                warn!(error = %err, "watch source did not stop cleanly on drop");
            }
        }
    }
}

/// Normalise a `notify` event into zero or more raw changes.
pub fn raw_changes(event: &Event) -> Vec<RawChange> {
    let all = |kind: ChangeKind| -> Vec<RawChange> {
        event
            .paths
            .iter()
            .map(|path| RawChange {
                path: path.clone(),
                kind,
            })
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Remove(_) => all(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(i, path)| RawChange {
                path: path.clone(),
                kind: if i == 0 {
                    ChangeKind::Removed
                } else {
                    ChangeKind::Created
                },
            })
            .collect(),
        // Ambiguous rename: the filesystem tells us which side we are on.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| RawChange {
                path: path.clone(),
                kind: if path.exists() {
                    ChangeKind::Created
                } else {
                    ChangeKind::Removed
                },
            })
            .collect(),
        EventKind::Modify(_) => all(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Find the root containing `path` and apply the filter relative to it.
fn accepts(roots: &[PathBuf], filter: &PathFilter, path: &Path) -> bool {
    roots
        .iter()
        .filter(|root| path.starts_with(root))
        .max_by_key(|root| root.components().count())
        .is_some_and(|root| filter.matches(root, path))
}

/// Turn the raw notification stream into one change set per window.
///
/// A window opens on the first accepted notification and closes `window`
/// later (or early, once `max_paths` distinct paths were touched).
async fn debounce_loop(
    source: SourceName,
    roots: Vec<PathBuf>,
    filter: PathFilter,
    window: Duration,
    max_paths: usize,
    mut raw_rx: mpsc::UnboundedReceiver<RawChange>,
    changes_tx: mpsc::Sender<ChangeSet>,
) {
    let mut coalescer = Coalescer::new();
    let max_paths = max_paths.max(1);

    while let Some(first) = raw_rx.recv().await {
        if !accepts(&roots, &filter, &first.path) {
            continue;
        }
        coalescer.record(first.path, first.kind);

        let deadline = tokio::time::sleep_until(Instant::now() + window);
        tokio::pin!(deadline);
        let mut closed = false;

        while coalescer.len() < max_paths {
            tokio::select! {
                _ = &mut deadline => break,
                next = raw_rx.recv() => match next {
                    Some(raw) => {
                        if accepts(&roots, &filter, &raw.path) {
                            coalescer.record(raw.path, raw.kind);
                        }
                    }
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        if coalescer.len() >= max_paths {
            warn!(source = %source, max_paths, "change set size limit reached; closing window early");
        }

        let changes = coalescer.take();
        if changes.is_empty() {
            debug!(source = %source, "window netted out to no changes");
        } else {
            debug!(
                source = %source,
                added = changes.added().len(),
                modified = changes.modified().len(),
                removed = changes.removed().len(),
                "emitting change set"
            );
            if changes_tx.send(changes).await.is_err() {
                debug!(source = %source, "change set receiver closed");
                break;
            }
        }

        if closed {
            break;
        }
    }

    debug!(source = %source, "debounce loop ended");
}

/// Deliver change sets to the handler one at a time, in emission order.
async fn dispatch_loop(
    source: SourceName,
    mut changes_rx: mpsc::Receiver<ChangeSet>,
    handler: Arc<dyn ChangeHandler>,
) {
    while let Some(changes) = changes_rx.recv().await {
        handler.on_change(changes).await;
    }
    debug!(source = %source, "dispatch loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |ev, p| ev.add_path(PathBuf::from(p)))
    }

    #[test]
    fn maps_basic_event_kinds() {
        let created = raw_changes(&event(EventKind::Create(CreateKind::File), &["/r/a.rb"]));
        assert_eq!(created[0].kind, ChangeKind::Created);

        let modified = raw_changes(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/a.rb"],
        ));
        assert_eq!(modified[0].kind, ChangeKind::Modified);

        let removed = raw_changes(&event(EventKind::Remove(RemoveKind::File), &["/r/a.rb"]));
        assert_eq!(removed[0].kind, ChangeKind::Removed);
    }

    #[test]
    fn rename_both_splits_into_remove_and_create() {
        let changes = raw_changes(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/old.rb", "/r/new.rb"],
        ));
        assert_eq!(
            changes,
            vec![
                RawChange {
                    path: PathBuf::from("/r/old.rb"),
                    kind: ChangeKind::Removed
                },
                RawChange {
                    path: PathBuf::from("/r/new.rb"),
                    kind: ChangeKind::Created
                },
            ]
        );
    }

    #[test]
    fn access_events_are_ignored() {
        let changes = raw_changes(&event(
            EventKind::Access(notify::event::AccessKind::Read),
            &["/r/a.rb"],
        ));
        assert!(changes.is_empty());
    }

    #[test]
    fn accepts_uses_the_innermost_root() {
        let filter = PathFilter::new(r"\.rb$", &["skip/**".to_string()]).unwrap();
        let roots = vec![PathBuf::from("/r")];

        assert!(accepts(&roots, &filter, Path::new("/r/a.rb")));
        assert!(!accepts(&roots, &filter, Path::new("/r/skip/a.rb")));
        assert!(!accepts(&roots, &filter, Path::new("/other/a.rb")));
    }

    #[test]
    fn stop_on_a_never_started_source_is_a_noop() {
        let source = WatchSource::new(WatchSourceSpec {
            name: "previews".into(),
            roots: vec![PathBuf::from("/does/not/matter")],
            filter: PathFilter::new(".*", &[]).unwrap(),
            polling: false,
            poll_interval: Duration::from_millis(100),
            debounce: Duration::from_millis(50),
            max_changeset_paths: 100,
        });

        assert!(source.stop().is_ok());
        assert!(source.stop().is_ok());
        assert!(!source.is_running());
    }

    #[tokio::test]
    async fn debounce_loop_coalesces_one_window() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (changes_tx, mut changes_rx) = mpsc::channel(4);
        let filter = PathFilter::new(r"\.rb$", &[]).unwrap();

        let task = tokio::spawn(debounce_loop(
            "test".into(),
            vec![PathBuf::from("/r")],
            filter,
            Duration::from_millis(50),
            100,
            raw_rx,
            changes_tx,
        ));

        let send = |path: &str, kind| {
            raw_tx
                .send(RawChange {
                    path: PathBuf::from(path),
                    kind,
                })
                .unwrap()
        };
        send("/r/a.rb", ChangeKind::Modified);
        send("/r/a.rb", ChangeKind::Modified);
        send("/r/tmp.rb", ChangeKind::Created);
        send("/r/tmp.rb", ChangeKind::Removed);
        send("/r/notes.md", ChangeKind::Modified);
        send("/r/b.rb", ChangeKind::Created);

        let changes = changes_rx.recv().await.unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.kind_of(Path::new("/r/a.rb")), Some(ChangeKind::Modified));
        assert_eq!(changes.kind_of(Path::new("/r/b.rb")), Some(ChangeKind::Created));

        drop(raw_tx);
        task.await.unwrap();
        assert!(changes_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn size_limit_closes_the_window_early() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (changes_tx, mut changes_rx) = mpsc::channel(4);

        let task = tokio::spawn(debounce_loop(
            "test".into(),
            vec![PathBuf::from("/r")],
            PathFilter::new(".*", &[]).unwrap(),
            Duration::from_millis(100),
            2,
            raw_rx,
            changes_tx,
        ));

        for name in ["/r/a.rb", "/r/b.rb", "/r/c.rb"] {
            raw_tx
                .send(RawChange {
                    path: PathBuf::from(name),
                    kind: ChangeKind::Modified,
                })
                .unwrap();
        }

        let first = changes_rx.recv().await.unwrap();
        let second = changes_rx.recv().await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.kind_of(Path::new("/r/a.rb")).is_some());
        assert!(first.kind_of(Path::new("/r/b.rb")).is_some());
        assert_eq!(second.len(), 1);
        assert_eq!(second.kind_of(Path::new("/r/c.rb")), Some(ChangeKind::Modified));

        drop(raw_tx);
        task.await.unwrap();
    }
}
