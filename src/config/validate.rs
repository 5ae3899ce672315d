// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{RawSettings, Settings};
use crate::errors::{LiveError, Result};

impl TryFrom<RawSettings> for Settings {
    type Error = LiveError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        Ok(Settings::new_unchecked(raw.live, raw.index, raw.source))
    }
}

/// Run semantic validation against loaded settings.
///
/// This checks:
/// - `[live]` numbers are usable (non-zero debounce, buffer, poll interval,
///   change set size)
/// - there is at least one source when `listen = true`
/// - source names are non-empty and unique, and every source has roots
/// - include regexes and exclude globs compile
/// - no two sources share or nest roots
fn validate_raw_settings(cfg: &RawSettings) -> Result<()> {
    validate_live_section(cfg)?;
    ensure_has_sources(cfg)?;
    validate_sources(cfg)?;
    validate_disjoint_roots(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> LiveError {
    LiveError::ConfigError(msg.into())
}

fn validate_live_section(cfg: &RawSettings) -> Result<()> {
    let live = &cfg.live;

    if live.debounce_ms == 0 {
        return Err(config_error("[live].debounce_ms must be >= 1 (got 0)"));
    }
    if live.poll_interval_ms == 0 {
        return Err(config_error("[live].poll_interval_ms must be >= 1 (got 0)"));
    }
    if live.subscriber_buffer == 0 {
        return Err(config_error("[live].subscriber_buffer must be >= 1 (got 0)"));
    }
    if live.max_changeset_paths == 0 {
        return Err(config_error("[live].max_changeset_paths must be >= 1 (got 0)"));
    }
    Ok(())
}

fn ensure_has_sources(cfg: &RawSettings) -> Result<()> {
    if cfg.live.listen && cfg.source.is_empty() {
        return Err(config_error(
            "config must contain at least one [[source]] section when [live].listen = true",
        ));
    }
    Ok(())
}

fn validate_sources(cfg: &RawSettings) -> Result<()> {
    let mut seen = HashSet::new();

    for source in &cfg.source {
        if source.name.trim().is_empty() {
            return Err(config_error("every [[source]] needs a non-empty `name`"));
        }
        if !seen.insert(source.name.as_str()) {
            return Err(config_error(format!(
                "source '{}' is defined more than once",
                source.name
            )));
        }
        if source.roots.is_empty() {
            return Err(config_error(format!(
                "source '{}' must list at least one root in `roots`",
                source.name
            )));
        }
        source.filter().map_err(|err| {
            config_error(format!("source '{}': {}", source.name, err))
        })?;
    }
    Ok(())
}

fn validate_disjoint_roots(cfg: &RawSettings) -> Result<()> {
    for (i, a) in cfg.source.iter().enumerate() {
        for b in cfg.source.iter().skip(i + 1) {
            for root_a in &a.roots {
                for root_b in &b.roots {
                    if root_a.starts_with(root_b) || root_b.starts_with(root_a) {
                        return Err(config_error(format!(
                            "sources '{}' and '{}' have overlapping roots {:?} and {:?}",
                            a.name, b.name, root_a, root_b
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::SourceConfig;
    use std::path::PathBuf;

    fn source(name: &str, root: &str) -> SourceConfig {
        SourceConfig {
            name: name.into(),
            roots: vec![PathBuf::from(root)],
            include: ".*".into(),
            exclude: vec![],
            use_polling: None,
        }
    }

    fn raw(sources: Vec<SourceConfig>) -> RawSettings {
        RawSettings {
            source: sources,
            ..RawSettings::default()
        }
    }

    #[test]
    fn accepts_disjoint_sources() {
        let settings = Settings::try_from(raw(vec![source("a", "/x/a"), source("b", "/x/b")]));
        assert!(settings.is_ok());
    }

    #[test]
    fn rejects_nested_roots() {
        let err = Settings::try_from(raw(vec![source("a", "/x"), source("b", "/x/b")]))
            .unwrap_err();
        assert!(matches!(err, LiveError::ConfigError(msg) if msg.contains("overlapping")));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Settings::try_from(raw(vec![source("a", "/x"), source("a", "/y")]))
            .unwrap_err();
        assert!(matches!(err, LiveError::ConfigError(msg) if msg.contains("more than once")));
    }

    #[test]
    fn listening_requires_a_source() {
        assert!(Settings::try_from(raw(vec![])).is_err());

        let mut quiet = raw(vec![]);
        quiet.live.listen = false;
        assert!(Settings::try_from(quiet).is_ok());
    }

    #[test]
    fn rejects_bad_include_regex() {
        let mut bad = source("a", "/x");
        bad.include = "(".into();
        let err = Settings::try_from(raw(vec![bad])).unwrap_err();
        assert!(matches!(err, LiveError::ConfigError(msg) if msg.contains("include pattern")));
    }

    #[test]
    fn rejects_zero_debounce() {
        let mut cfg = raw(vec![source("a", "/x")]);
        cfg.live.debounce_ms = 0;
        assert!(Settings::try_from(cfg).is_err());
    }
}
