#![allow(dead_code)]

use std::path::{Path, PathBuf};

use preview_live::config::{RawSettings, Settings, SourceConfig};

/// Builder for `Settings` to simplify test setup.
///
/// Starts from the defaults with a short debounce so tests don't wait long.
pub struct SettingsBuilder {
    raw: RawSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        let mut raw = RawSettings::default();
        raw.live.debounce_ms = 50;
        Self { raw }
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.raw.source.push(source);
        self
    }

    pub fn listen(mut self, val: bool) -> Self {
        self.raw.live.listen = val;
        self
    }

    pub fn auto_refresh(mut self, val: bool) -> Self {
        self.raw.live.auto_refresh = val;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.raw.live.debounce_ms = ms;
        self
    }

    pub fn subscriber_buffer(mut self, n: usize) -> Self {
        self.raw.live.subscriber_buffer = n;
        self
    }

    pub fn runtime_parsing(mut self, val: bool) -> Self {
        self.raw.index.runtime_parsing = val;
        self
    }

    pub fn registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw.index.registry_path = path.into();
        self
    }

    pub fn raw(self) -> RawSettings {
        self.raw
    }

    pub fn build(self) -> Settings {
        Settings::try_from(self.raw).expect("Failed to build valid settings from builder")
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `SourceConfig`.
pub struct SourceConfigBuilder {
    source: SourceConfig,
}

impl SourceConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            source: SourceConfig {
                name: name.to_string(),
                roots: vec![],
                include: ".*".to_string(),
                exclude: vec![],
                use_polling: None,
            },
        }
    }

    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        self.source.roots.push(root.as_ref().to_path_buf());
        self
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.source.include = pattern.to_string();
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.source.exclude.push(pattern.to_string());
        self
    }

    pub fn use_polling(mut self, val: bool) -> Self {
        self.source.use_polling = Some(val);
        self
    }

    pub fn build(self) -> SourceConfig {
        self.source
    }
}
