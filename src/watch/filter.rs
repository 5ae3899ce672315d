// src/watch/filter.rs

use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::errors::WatchError;

/// Compiled include/exclude rules for one watch source.
///
/// - `include` is a regex matched against the *file name* (for example
///   `\.(rb|html.*)$`).
/// - `exclude` is an optional set of globs matched against the path relative
///   to the root that contains it (for example `"**/tmp/**"`).
///
/// A path must match `include` and must not match `exclude`.
#[derive(Clone)]
pub struct PathFilter {
    include: Regex,
    exclude: Option<GlobSet>,
    exclude_patterns: Vec<String>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("include", &self.include.as_str())
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

impl PathFilter {
    pub fn new(include: &str, exclude: &[String]) -> Result<Self, WatchError> {
        let include_re = Regex::new(include).map_err(|cause| WatchError::InvalidInclude {
            pattern: include.to_string(),
            cause,
        })?;

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };

        Ok(Self {
            include: include_re,
            exclude: exclude_set,
            exclude_patterns: exclude.to_vec(),
        })
    }

    pub fn include_pattern(&self) -> &str {
        self.include.as_str()
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Returns true if `path` (somewhere under `root`) should be reported.
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        let Some(file_name) = path.file_name() else {
            return false;
        };
        if !self.include.is_match(&file_name.to_string_lossy()) {
            return false;
        }

        if let Some(exclude) = &self.exclude {
            // Paths outside the root cannot be relativized; only the include
            // rule applies to them.
            if let Some(rel) = relative_str(root, path) {
                if exclude.is_match(&rel) {
                    return false;
                }
            }
        }

        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet, WatchError> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|cause| WatchError::InvalidExclude {
            pattern: pat.clone(),
            cause,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|cause| WatchError::InvalidExclude {
        pattern: patterns.join(", "),
        cause,
    })
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to comparing canonicalized paths, which matters on platforms
/// where the same directory is reachable through several absolute prefixes
/// (macOS `/private/var/...`). Returns `None` if `path` is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_matches_on_file_name() {
        let filter = PathFilter::new(r"\.(rb|html.*)$", &[]).unwrap();
        let root = Path::new("/app/previews");

        assert!(filter.matches(root, Path::new("/app/previews/button_preview.rb")));
        assert!(filter.matches(root, Path::new("/app/previews/card.html.erb")));
        assert!(!filter.matches(root, Path::new("/app/previews/notes.md")));
        assert!(!filter.matches(root, Path::new("/app/previews/rb")));
    }

    #[test]
    fn exclude_globs_apply_relative_to_root() {
        let filter =
            PathFilter::new(r"\.rb$", &["tmp/**".to_string(), "**/*_spec.rb".to_string()])
                .unwrap();
        let root = Path::new("/app/previews");

        assert!(filter.matches(root, Path::new("/app/previews/a.rb")));
        assert!(!filter.matches(root, Path::new("/app/previews/tmp/a.rb")));
        assert!(!filter.matches(root, Path::new("/app/previews/nested/a_spec.rb")));
    }

    #[test]
    fn invalid_patterns_are_reported() {
        assert!(matches!(
            PathFilter::new("(", &[]),
            Err(WatchError::InvalidInclude { .. })
        ));
        assert!(matches!(
            PathFilter::new(".*", &["a[".to_string()]),
            Err(WatchError::InvalidExclude { .. })
        ));
    }

    #[test]
    fn relative_str_uses_forward_slashes() {
        let rel = relative_str(Path::new("/root"), Path::new("/root/a/b.rb"));
        assert_eq!(rel.as_deref(), Some("a/b.rb"));
        assert_eq!(relative_str(Path::new("/root"), Path::new("/elsewhere/b.rb")), None);
    }
}
