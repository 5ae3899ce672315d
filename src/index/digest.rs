// src/index/digest.rs

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::trace;

use super::snapshot::IndexEntry;

/// Hash the contents of a single file.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let hash = hasher.finalize().to_hex().to_string();
    trace!(?path, hash = %hash, "hashed file");
    Ok(hash)
}

/// Deterministic fingerprint over a set of entries.
///
/// Order of `entries` does not matter; they are sorted before hashing.
pub fn fingerprint(entries: &[IndexEntry]) -> String {
    let mut keyed: Vec<&IndexEntry> = entries.iter().collect();
    keyed.sort_by(|a, b| (&a.source, &a.path).cmp(&(&b.source, &b.path)));

    let mut hasher = Hasher::new();
    for entry in keyed {
        hasher.update(entry.source.as_bytes());
        hasher.update(&[0]);
        hasher.update(entry.path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(entry.digest.as_bytes());
        hasher.update(&[b'\n']);
    }
    hasher.finalize().to_hex().to_string()
}
