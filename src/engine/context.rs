// src/engine/context.rs

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::coordinator::ReindexCoordinator;
use super::lifecycle::{Lifecycle, LifecycleState};
use super::listeners::ListenerRegistry;
use crate::broadcast::{LiveChannel, Payload, SubscriptionHandle};
use crate::config::Settings;
use crate::errors::{LiveError, Result, WatchError};
use crate::hooks::{HookArgs, HookContext, HookEvent, HookRegistry};
use crate::index::{registry, FsReindexer, Index, Reindexer};
use crate::watch::{ChangeHandler, WatchSource};

/// What happened during [`LiveContext::boot`].
#[derive(Debug, Default)]
pub struct BootReport {
    /// Sources that started watching, in configuration order.
    pub started: Vec<String>,
    /// Sources that could not start. Boot carried on without them.
    pub failed: Vec<WatchError>,
    /// Version of the snapshot available after boot, if any.
    pub index_version: Option<u64>,
    pub failed_hooks: usize,
}

impl BootReport {
    pub fn all_started(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Everything one live-feedback loop needs, owned in one place.
///
/// Nothing here is global: tests build as many isolated contexts as they
/// like. Consumers that only read previews get the index through
/// [`LiveContext::index`].
pub struct LiveContext {
    settings: Arc<Settings>,
    index: Arc<Index>,
    hooks: Arc<HookRegistry>,
    channel: Arc<LiveChannel>,
    listeners: ListenerRegistry,
    lifecycle: Lifecycle,
    coordinator: Arc<ReindexCoordinator>,
}

impl fmt::Debug for LiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveContext")
            .field("state", &self.lifecycle.state())
            .field("index", &self.index)
            .field("listeners", &self.listeners.names())
            .finish_non_exhaustive()
    }
}

impl LiveContext {
    pub fn new(settings: Settings, reindexer: Arc<dyn Reindexer>) -> Self {
        let index = Arc::new(Index::new());
        let hooks = Arc::new(HookRegistry::new());
        let channel = Arc::new(LiveChannel::new(
            settings.live().auto_refresh,
            settings.channel_options(),
        ));
        let coordinator = Arc::new(ReindexCoordinator::new(
            Arc::clone(&index),
            reindexer,
            Arc::clone(&hooks),
            Arc::clone(&channel),
        ));

        Self {
            settings: Arc::new(settings),
            index,
            hooks,
            channel,
            listeners: ListenerRegistry::new(),
            lifecycle: Lifecycle::new(),
            coordinator,
        }
    }

    /// Build a context that indexes the configured sources from disk.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let specs = settings.source_specs()?;
        let reindexer = Arc::new(FsReindexer::new(&specs));
        Ok(Self::new(settings, reindexer))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn channel(&self) -> &Arc<LiveChannel> {
        &self.channel
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn coordinator(&self) -> &Arc<ReindexCoordinator> {
        &self.coordinator
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Attach a viewer. `None` when live refresh is disabled.
    pub fn subscribe(&self) -> Option<SubscriptionHandle> {
        self.channel.subscribe()
    }

    /// Publish a custom event to every attached viewer.
    pub fn broadcast(&self, name: &str, payload: Payload) -> usize {
        self.channel.broadcast(name, payload)
    }

    fn hook_context(&self) -> HookContext {
        HookContext::new(Arc::clone(&self.index), Arc::clone(&self.channel))
    }

    /// Start watching, build (or load) the index and run `after_initialize`
    /// hooks.
    ///
    /// A source that fails to start is reported in the [`BootReport`] and
    /// boot carries on with the others. Booting twice is an error.
    pub async fn boot(&self) -> Result<BootReport> {
        self.lifecycle.start().map_err(|state| {
            LiveError::Lifecycle(format!("cannot boot a context that is {state}"))
        })?;

        let mut report = BootReport::default();

        if self.settings.live().listen {
            let handler: Arc<dyn ChangeHandler> = self.coordinator.clone();
            for spec in self.settings.source_specs()? {
                let name = spec.name.clone();
                match self
                    .listeners
                    .register(Arc::new(WatchSource::new(spec)), Arc::clone(&handler))
                {
                    Ok(()) => report.started.push(name),
                    Err(err) => {
                        error!(source = %name, error = %err, "watch source failed to start");
                        report.failed.push(err);
                    }
                }
            }
        } else {
            info!("listening disabled; no watch sources started");
        }

        report.index_version = self.initial_index().await;

        report.failed_hooks = self.hooks.run(
            HookEvent::AfterInitialize,
            &self.hook_context(),
            HookArgs::None,
        );

        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            index_version = ?report.index_version,
            "live context running"
        );
        Ok(report)
    }

    /// Build or load the first snapshot. Failures are logged and leave the
    /// index stale; they never abort boot.
    async fn initial_index(&self) -> Option<u64> {
        let index = self.settings.index();

        if index.runtime_parsing {
            return match self.coordinator.rebuild_now().await {
                Ok(snapshot) => Some(snapshot.version()),
                Err(err) => {
                    let err = format!("{err:#}");
                    error!(error = %err, "initial index build failed; index left stale");
                    None
                }
            };
        }

        match registry::load(&index.registry_path) {
            Ok(Some(snapshot)) => {
                let snapshot = self.index.restore(snapshot);
                info!(
                    path = ?index.registry_path,
                    entries = snapshot.len(),
                    "index loaded from registry"
                );
                Some(snapshot.version())
            }
            Ok(None) => {
                warn!(
                    path = ?index.registry_path,
                    "registry file not found; run with --preparse to create it"
                );
                None
            }
            Err(err) => {
                error!(
                    path = ?index.registry_path,
                    error = %err,
                    "registry file unreadable; index left stale"
                );
                None
            }
        }
    }

    /// Stop every source, run `before_exit` hooks and close the channel.
    ///
    /// Only the first call does anything; it returns `true`. A context that
    /// never booted is just marked stopped.
    pub fn shutdown(&self) -> bool {
        if !self.lifecycle.stop() {
            return false;
        }

        info!("shutting down live context");
        let failed = self.listeners.stop_all();
        if failed > 0 {
            warn!(failed, "some listeners did not stop cleanly");
        }

        self.hooks
            .run(HookEvent::BeforeExit, &self.hook_context(), HookArgs::None);
        self.channel.close();
        true
    }
}

impl Drop for LiveContext {
    fn drop(&mut self) {
        if self.lifecycle.state() == LifecycleState::Running {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawSettings;
    use crate::index::IndexEntry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quiet_settings() -> Settings {
        let mut raw = RawSettings::default();
        raw.live.listen = false;
        Settings::try_from(raw).unwrap()
    }

    fn empty_reindexer() -> Arc<dyn Reindexer> {
        Arc::new(|| -> anyhow::Result<Vec<IndexEntry>> { Ok(vec![]) })
    }

    #[tokio::test]
    async fn boot_builds_index_and_runs_hooks() {
        let ctx = LiveContext::new(quiet_settings(), empty_reindexer());
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = Arc::clone(&ran);
            ctx.hooks().after_initialize(move |hook_ctx, _| {
                assert!(hook_ctx.index().is_fresh());
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let report = ctx.boot().await.unwrap();

        assert_eq!(report.index_version, Some(1));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.state(), LifecycleState::Running);
    }

    #[tokio::test]
    async fn second_boot_is_rejected() {
        let ctx = LiveContext::new(quiet_settings(), empty_reindexer());
        ctx.boot().await.unwrap();

        let err = ctx.boot().await.unwrap_err();
        assert!(matches!(err, LiveError::Lifecycle(_)));
    }

    #[tokio::test]
    async fn shutdown_runs_once() {
        let ctx = LiveContext::new(quiet_settings(), empty_reindexer());
        let exits = Arc::new(AtomicUsize::new(0));
        {
            let exits = Arc::clone(&exits);
            ctx.hooks().before_exit(move |_, _| {
                exits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        ctx.boot().await.unwrap();

        assert!(ctx.shutdown());
        assert!(!ctx.shutdown());
        assert_eq!(exits.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.state(), LifecycleState::Stopped);
    }

    #[test]
    fn shutdown_before_boot_skips_hooks() {
        let ctx = LiveContext::new(quiet_settings(), empty_reindexer());
        ctx.hooks().before_exit(|_, _| panic!("must not run"));

        assert!(!ctx.shutdown());
        assert_eq!(ctx.state(), LifecycleState::Stopped);
    }
}
