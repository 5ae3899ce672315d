// src/watch/changeset.rs

//! Change sets and the per-window coalescing that produces them.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broadcast::Payload;
use crate::types::ChangeKind;

/// One coalesced batch of file changes produced by a single debounce window.
///
/// A path appears in at most one of the three sets. Once built, a change set
/// is never merged with another one: every `reload` broadcast carries exactly
/// one of these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    added: BTreeSet<PathBuf>,
    modified: BTreeSet<PathBuf>,
    removed: BTreeSet<PathBuf>,
}

impl ChangeSet {
    /// Build a change set from explicit path lists.
    ///
    /// If the same path is listed under several kinds, the later category
    /// wins in the order added → modified → removed.
    pub fn new<A, M, R>(added: A, modified: M, removed: R) -> Self
    where
        A: IntoIterator<Item = PathBuf>,
        M: IntoIterator<Item = PathBuf>,
        R: IntoIterator<Item = PathBuf>,
    {
        let removed: BTreeSet<PathBuf> = removed.into_iter().collect();
        let modified: BTreeSet<PathBuf> = modified
            .into_iter()
            .filter(|p| !removed.contains(p))
            .collect();
        let added: BTreeSet<PathBuf> = added
            .into_iter()
            .filter(|p| !removed.contains(p) && !modified.contains(p))
            .collect();

        Self {
            added,
            modified,
            removed,
        }
    }

    pub fn added(&self) -> &BTreeSet<PathBuf> {
        &self.added
    }

    pub fn modified(&self) -> &BTreeSet<PathBuf> {
        &self.modified
    }

    pub fn removed(&self) -> &BTreeSet<PathBuf> {
        &self.removed
    }

    /// Total number of distinct paths in this change set.
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Net classification of `path` in this change set, if present.
    pub fn kind_of(&self, path: &Path) -> Option<ChangeKind> {
        if self.added.contains(path) {
            Some(ChangeKind::Created)
        } else if self.modified.contains(path) {
            Some(ChangeKind::Modified)
        } else if self.removed.contains(path) {
            Some(ChangeKind::Removed)
        } else {
            None
        }
    }

    /// Iterate over every path in the change set regardless of kind.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .chain(self.removed.iter())
    }

    /// Payload for the `reload` event:
    /// `{"added": [...], "modified": [...], "removed": [...]}`.
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert("added".to_string(), path_list(&self.added));
        payload.insert("modified".to_string(), path_list(&self.modified));
        payload.insert("removed".to_string(), path_list(&self.removed));
        payload
    }
}

fn path_list(paths: &BTreeSet<PathBuf>) -> Value {
    Value::Array(
        paths
            .iter()
            .map(|p| Value::String(p.to_string_lossy().into_owned()))
            .collect(),
    )
}

/// Existence of a path at the start of the window and after the last event.
#[derive(Debug, Clone, Copy)]
struct PathState {
    existed_before: bool,
    exists_now: bool,
}

impl PathState {
    fn first(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Created => Self {
                existed_before: false,
                exists_now: true,
            },
            ChangeKind::Modified => Self {
                existed_before: true,
                exists_now: true,
            },
            ChangeKind::Removed => Self {
                existed_before: true,
                exists_now: false,
            },
        }
    }

    fn apply(&mut self, kind: ChangeKind) {
        self.exists_now = !matches!(kind, ChangeKind::Removed);
    }

    fn net(self) -> Option<ChangeKind> {
        match (self.existed_before, self.exists_now) {
            (false, true) => Some(ChangeKind::Created),
            (true, true) => Some(ChangeKind::Modified),
            (true, false) => Some(ChangeKind::Removed),
            (false, false) => None,
        }
    }
}

/// Accumulates raw notifications for one debounce window.
///
/// Each path is classified by its net effect across the window: a file that
/// was created and then deleted before the window closed is dropped.
#[derive(Debug, Default)]
pub struct Coalescer {
    paths: HashMap<PathBuf, PathState>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one raw notification.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        self.paths
            .entry(path)
            .and_modify(|state| state.apply(kind))
            .or_insert_with(|| PathState::first(kind));
    }

    /// Number of distinct paths touched in the current window.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Close the window: produce the change set and reset.
    pub fn take(&mut self) -> ChangeSet {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();

        for (path, state) in self.paths.drain() {
            match state.net() {
                Some(ChangeKind::Created) => added.push(path),
                Some(ChangeKind::Modified) => modified.push(path),
                Some(ChangeKind::Removed) => removed.push(path),
                None => {}
            }
        }

        ChangeSet::new(added, modified, removed)
    }
}
