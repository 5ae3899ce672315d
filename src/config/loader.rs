// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw settings.
///
/// This only performs TOML deserialization and path resolution; it does
/// **not** perform semantic validation. Use [`load_and_validate`] for that.
///
/// Relative source roots and the registry path are resolved against the
/// directory containing the config file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: RawSettings = toml::from_str(&contents)?;
    resolve_paths(&mut config, &config_root_dir(path));

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Resolves relative paths against the config file's directory.
/// - Checks sources, filters and `[live]` numbers.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let raw = load_from_path(&path)?;
    Settings::try_from(raw)
}

/// Directory the config file lives in.
///
/// - If the config path has a non-empty parent (e.g. "config/preview-live.toml"),
///   we use that directory.
/// - If it's just a bare filename (parent = ""), we fall back to the current
///   working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn resolve_paths(config: &mut RawSettings, base: &Path) {
    for source in &mut config.source {
        for root in &mut source.roots {
            if root.is_relative() {
                *root = base.join(&*root);
            }
        }
    }
    if config.index.registry_path.is_relative() {
        config.index.registry_path = base.join(&config.index.registry_path);
    }
}
