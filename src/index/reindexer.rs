// src/index/reindexer.rs

//! The reindex operation.
//!
//! The pipeline only cares whether a rebuild succeeded; what a rebuild
//! actually parses is up to the [`Reindexer`] implementation. The bundled
//! [`FsReindexer`] records every watched file with a content hash.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::digest::digest_file;
use super::snapshot::IndexEntry;
use crate::watch::{PathFilter, WatchSourceSpec};

/// Rebuilds the index contents from scratch.
///
/// Called on the blocking thread pool, never concurrently with itself.
pub trait Reindexer: Send + Sync {
    fn reindex(&self) -> Result<Vec<IndexEntry>>;
}

impl<F> Reindexer for F
where
    F: Fn() -> Result<Vec<IndexEntry>> + Send + Sync,
{
    fn reindex(&self) -> Result<Vec<IndexEntry>> {
        self()
    }
}

#[derive(Debug, Clone)]
struct IndexedSource {
    name: String,
    roots: Vec<PathBuf>,
    filter: PathFilter,
}

/// Indexes every file under the watch sources' roots that passes the
/// source's filter.
#[derive(Debug, Clone)]
pub struct FsReindexer {
    sources: Vec<IndexedSource>,
}

impl FsReindexer {
    pub fn new(specs: &[WatchSourceSpec]) -> Self {
        let sources = specs
            .iter()
            .map(|spec| IndexedSource {
                name: spec.name.clone(),
                roots: spec.roots.clone(),
                filter: spec.filter.clone(),
            })
            .collect();
        Self { sources }
    }
}

impl Reindexer for FsReindexer {
    fn reindex(&self) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::new();

        for source in &self.sources {
            for root in &source.roots {
                let files = collect_matching_files(root, &source.filter)
                    .with_context(|| format!("indexing source '{}' at {:?}", source.name, root))?;
                for path in files {
                    let Some(digest) = digest_if_present(&path)? else {
                        continue;
                    };
                    entries.push(IndexEntry {
                        source: source.name.clone(),
                        path,
                        digest,
                    });
                }
            }
        }

        debug!(entries = entries.len(), "filesystem reindex complete");
        Ok(entries)
    }
}

/// Hash `path`, or `None` if it was deleted since the walk saw it.
fn digest_if_present(path: &Path) -> Result<Option<String>> {
    match digest_file(path) {
        Ok(digest) => Ok(Some(digest)),
        Err(err) if is_not_found(&err) => {
            debug!(?path, "file vanished during reindex; skipping");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
    })
}

/// Collect all files under `root` that pass `filter`.
///
/// Symlinked directories are not descended into, so link cycles cannot
/// make the walk revisit a directory. Symlinked files are indexed.
/// Subdirectories that disappear mid-walk are skipped.
fn collect_matching_files(root: &Path, filter: &PathFilter) -> Result<Vec<PathBuf>> {
    let root = root.canonicalize().with_context(|| format!("resolving root {:?}", root))?;
    let mut files = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound && dir != root => {
                debug!(?dir, "directory vanished during reindex; skipping");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading dir {:?}", dir));
            }
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            let is_file = if file_type.is_dir() {
                stack.push(path);
                continue;
            } else if file_type.is_symlink() {
                fs::metadata(&path).is_ok_and(|meta| meta.is_file())
            } else {
                file_type.is_file()
            };

            if is_file && filter.matches(&root, &path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
