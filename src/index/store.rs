// src/index/store.rs

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::snapshot::{IndexEntry, IndexSnapshot};

/// What a reader sees: the current complete snapshot (if any build has
/// succeeded yet) and whether it reflects every change seen so far.
#[derive(Debug, Clone)]
pub struct IndexView {
    pub snapshot: Option<Arc<IndexSnapshot>>,
    pub fresh: bool,
}

impl IndexView {
    pub fn is_stale(&self) -> bool {
        !self.fresh
    }
}

#[derive(Debug, Default)]
struct IndexState {
    current: Option<Arc<IndexSnapshot>>,
    /// Bumped by every invalidation.
    generation: u64,
    /// Generation observed when the current snapshot's build started.
    built_generation: Option<u64>,
    last_version: u64,
}

impl IndexState {
    fn fresh(&self) -> bool {
        self.current.is_some() && self.built_generation == Some(self.generation)
    }
}

/// The shared, replaceable index.
///
/// Writes swap a whole `Arc<IndexSnapshot>` under a short lock, so readers
/// get either the previous or the next complete build and never a partial
/// one. Freshness is tracked with a generation counter: an index is fresh
/// only if no invalidation happened after its build started.
#[derive(Default)]
pub struct Index {
    state: RwLock<IndexState>,
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.view();
        f.debug_struct("Index")
            .field("version", &view.snapshot.as_ref().map(|s| s.version()))
            .field("fresh", &view.fresh)
            .finish()
    }
}

impl Index {
    /// An index with no snapshot yet; it reads as stale until the first
    /// successful build.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> IndexView {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        IndexView {
            snapshot: state.current.clone(),
            fresh: state.fresh(),
        }
    }

    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    pub fn is_fresh(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fresh()
    }

    pub fn generation(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Mark the index as needing a rebuild. Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        debug!(generation = state.generation, "index invalidated");
        state.generation
    }

    /// Publish a freshly built snapshot.
    ///
    /// `built_from` is the generation read when the build started; if the
    /// index was invalidated again since then the new snapshot is swapped in
    /// but stays marked stale.
    pub fn publish(&self, entries: Vec<IndexEntry>, built_from: u64) -> Arc<IndexSnapshot> {
        // Sorting and fingerprinting happen outside the lock.
        let built = IndexSnapshot::new(0, entries);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.last_version += 1;
        let snapshot = Arc::new(built.with_version(state.last_version));
        state.current = Some(Arc::clone(&snapshot));
        state.built_generation = Some(built_from);
        let fresh = state.fresh();
        drop(state);

        info!(
            version = snapshot.version(),
            entries = snapshot.len(),
            fresh,
            "index snapshot published"
        );
        snapshot
    }

    /// Install a snapshot loaded from elsewhere (e.g. the registry file) as
    /// the current, fresh build.
    pub fn restore(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.last_version += 1;
        let snapshot = Arc::new(snapshot.with_version(state.last_version));
        state.current = Some(Arc::clone(&snapshot));
        state.built_generation = Some(state.generation);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entries(n: usize) -> Vec<IndexEntry> {
        (0..n)
            .map(|i| IndexEntry {
                source: "previews".into(),
                path: PathBuf::from(format!("/p/{i}.rb")),
                digest: format!("{i}"),
            })
            .collect()
    }

    #[test]
    fn new_index_is_stale_and_empty() {
        let index = Index::new();
        let view = index.view();
        assert!(view.snapshot.is_none());
        assert!(view.is_stale());
    }

    #[test]
    fn publish_makes_index_fresh() {
        let index = Index::new();
        let generation = index.generation();
        let snap = index.publish(entries(3), generation);

        assert_eq!(snap.version(), 1);
        assert!(index.is_fresh());
        assert_eq!(index.snapshot().unwrap().len(), 3);
    }

    #[test]
    fn invalidate_keeps_previous_snapshot_but_marks_stale() {
        let index = Index::new();
        index.publish(entries(2), index.generation());
        index.invalidate();

        let view = index.view();
        assert!(view.is_stale());
        assert_eq!(view.snapshot.unwrap().len(), 2);
    }

    #[test]
    fn build_overtaken_by_invalidation_stays_stale() {
        let index = Index::new();
        let started_at = index.invalidate();
        // Another change arrives while the build is running.
        index.invalidate();
        index.publish(entries(1), started_at);
        assert!(!index.is_fresh());

        index.publish(entries(1), index.generation());
        assert!(index.is_fresh());
        assert_eq!(index.snapshot().unwrap().version(), 2);
    }

    #[test]
    fn restore_installs_a_fresh_snapshot() {
        let index = Index::new();
        index.invalidate();
        let restored = index.restore(IndexSnapshot::new(41, entries(4)));

        assert_eq!(restored.version(), 1);
        assert!(index.is_fresh());
    }
}
