// src/index/snapshot.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::digest::fingerprint;

/// One indexed preview or page file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Name of the watch source whose roots contain this file.
    pub source: String,
    pub path: PathBuf,
    /// Content hash of the file at build time.
    pub digest: String,
}

/// A complete, immutable build of the index.
///
/// Snapshots are only ever published whole; readers holding an
/// `Arc<IndexSnapshot>` keep seeing exactly the build they obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    version: u64,
    fingerprint: String,
    entries: Vec<IndexEntry>,
}

impl IndexSnapshot {
    pub fn new(version: u64, mut entries: Vec<IndexEntry>) -> Self {
        entries.sort_by(|a, b| (&a.source, &a.path).cmp(&(&b.source, &b.path)));
        let fingerprint = fingerprint(&entries);
        Self {
            version,
            fingerprint,
            entries,
        }
    }

    /// Monotonically increasing build number within one process.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Content fingerprint; equal fingerprints mean equal indexed content.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries contributed by one watch source.
    pub fn by_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        self.entries.iter().filter(move |e| e.source == source)
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}
