use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a watch source (e.g. `"previews"`, `"pages"`).
pub type SourceName = String;

/// Kind of a single raw filesystem notification, after it has been
/// normalised away from the platform-specific watcher event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        };
        f.write_str(s)
    }
}
