// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::broadcast::ChannelOptions;
use crate::errors::WatchError;
use crate::watch::{PathFilter, WatchSourceSpec};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [live]
/// auto_refresh = true
/// debounce_ms = 200
///
/// [index]
/// runtime_parsing = true
///
/// [[source]]
/// name = "previews"
/// roots = ["test/components/previews", "app/components"]
/// include = '\.(rb|html.*)$'
///
/// [[source]]
/// name = "pages"
/// roots = ["test/components/docs"]
/// include = '\.(html.*|md.*)$'
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettings {
    #[serde(default)]
    pub live: LiveSection,

    #[serde(default)]
    pub index: IndexSection,

    /// All watch sources from `[[source]]`, in declaration order.
    #[serde(default)]
    pub source: Vec<SourceConfig>,
}

/// Validated settings.
///
/// The only way to get one is through `TryFrom<RawSettings>` (see
/// `validate.rs`), so anything holding a `Settings` can rely on its
/// invariants.
#[derive(Debug, Clone)]
pub struct Settings {
    live: LiveSection,
    index: IndexSection,
    sources: Vec<SourceConfig>,
}

impl Settings {
    pub(crate) fn new_unchecked(
        live: LiveSection,
        index: IndexSection,
        sources: Vec<SourceConfig>,
    ) -> Self {
        Self {
            live,
            index,
            sources,
        }
    }

    pub fn live(&self) -> &LiveSection {
        &self.live
    }

    pub fn index(&self) -> &IndexSection {
        &self.index
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            subscriber_buffer: self.live.subscriber_buffer,
            mount_path: self.live.mount_path.clone(),
        }
    }

    /// Compile every configured source into a watch source spec.
    pub fn source_specs(&self) -> Result<Vec<WatchSourceSpec>, WatchError> {
        self.sources
            .iter()
            .map(|source| source.to_spec(&self.live))
            .collect()
    }
}

/// `[live]` section: watching and live-refresh behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveSection {
    /// Watch the source roots for changes at all.
    #[serde(default = "default_true")]
    pub listen: bool,

    /// Push `reload` events to connected viewers.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,

    /// Length of one debounce window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// A window closes early once it has touched this many distinct paths.
    #[serde(default = "default_max_changeset_paths")]
    pub max_changeset_paths: usize,

    /// Use polling instead of native filesystem notifications (e.g. for
    /// network mounts or containers).
    #[serde(default)]
    pub use_polling: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-subscriber queue length; a subscriber that falls this far behind
    /// is dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// Path the transport layer mounts the live channel under.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_max_changeset_paths() -> usize {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_mount_path() -> String {
    "/live".to_string()
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            listen: true,
            auto_refresh: true,
            debounce_ms: default_debounce_ms(),
            max_changeset_paths: default_max_changeset_paths(),
            use_polling: false,
            poll_interval_ms: default_poll_interval_ms(),
            subscriber_buffer: default_subscriber_buffer(),
            mount_path: default_mount_path(),
        }
    }
}

impl LiveSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[index]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSection {
    /// Build the index at boot. When false, the index is loaded from
    /// `registry_path` (written by `--preparse`).
    #[serde(default = "default_true")]
    pub runtime_parsing: bool,

    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from(".preview-live/registry.json")
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            runtime_parsing: true,
            registry_path: default_registry_path(),
        }
    }
}

/// One `[[source]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    /// Directories watched (recursively) by this source.
    pub roots: Vec<PathBuf>,

    /// Regex over the file name; only matching files are reported.
    #[serde(default = "default_include")]
    pub include: String,

    /// Globs relative to the containing root; matching files are ignored.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Per-source override of `[live].use_polling`.
    #[serde(default)]
    pub use_polling: Option<bool>,
}

fn default_include() -> String {
    ".*".to_string()
}

impl SourceConfig {
    /// Effective polling mode given the global default.
    pub fn effective_use_polling(&self, live: &LiveSection) -> bool {
        self.use_polling.unwrap_or(live.use_polling)
    }

    pub fn filter(&self) -> Result<PathFilter, WatchError> {
        PathFilter::new(&self.include, &self.exclude)
    }

    pub fn to_spec(&self, live: &LiveSection) -> Result<WatchSourceSpec, WatchError> {
        Ok(WatchSourceSpec {
            name: self.name.clone(),
            roots: self.roots.clone(),
            filter: self.filter()?,
            polling: self.effective_use_polling(live),
            poll_interval: live.poll_interval(),
            debounce: live.debounce(),
            max_changeset_paths: live.max_changeset_paths,
        })
    }
}
