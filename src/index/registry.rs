// src/index/registry.rs

//! On-disk registry of a pre-built index.
//!
//! When runtime parsing is disabled the index is built ahead of time
//! (`preview-live --preparse`) and loaded from this JSON file at boot.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::snapshot::IndexSnapshot;
use crate::errors::Result;

/// Write `snapshot` to `path`, creating parent directories as needed.
pub fn save(path: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;

    info!(?path, entries = snapshot.len(), "index registry written");
    Ok(())
}

/// Load a registry file. Returns `Ok(None)` if it does not exist.
pub fn load(path: &Path) -> Result<Option<IndexSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let snapshot: IndexSnapshot = serde_json::from_reader(BufReader::new(file))?;
    Ok(Some(snapshot))
}
