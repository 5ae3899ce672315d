// src/engine/coordinator.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::broadcast::{LiveChannel, RELOAD_EVENT};
use crate::hooks::{HookArgs, HookContext, HookEvent, HookRegistry};
use crate::index::{Index, IndexSnapshot, Reindexer};
use crate::watch::{ChangeHandler, ChangeSet};

/// Result of processing one change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// A new snapshot was published with this version.
    Rebuilt { version: u64 },
    /// The rebuild failed; the index was left invalidated.
    Failed,
}

/// Turns change sets into index rebuilds, hook runs and `reload` events.
///
/// Every rebuild runs under one lock, so no two rebuilds ever overlap no
/// matter how many watch sources deliver at once. The lock is a fair tokio
/// mutex: a change set that arrives during a rebuild waits its turn and then
/// triggers a rebuild of its own. The guard is owned by the blocking rebuild
/// task, so cancelling the caller does not release it early.
pub struct ReindexCoordinator {
    index: Arc<Index>,
    reindexer: Arc<dyn Reindexer>,
    hooks: Arc<HookRegistry>,
    channel: Arc<LiveChannel>,
    rebuild_lock: Arc<Mutex<()>>,
}

impl fmt::Debug for ReindexCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReindexCoordinator")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl ReindexCoordinator {
    pub fn new(
        index: Arc<Index>,
        reindexer: Arc<dyn Reindexer>,
        hooks: Arc<HookRegistry>,
        channel: Arc<LiveChannel>,
    ) -> Self {
        Self {
            index,
            reindexer,
            hooks,
            channel,
            rebuild_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    fn hook_context(&self) -> HookContext {
        HookContext::new(Arc::clone(&self.index), Arc::clone(&self.channel))
    }

    /// Handle one change set end to end.
    ///
    /// 1. invalidate the index (immediately, before waiting for the lock);
    /// 2. rebuild under the rebuild lock;
    /// 3. on failure, log and leave the index invalidated;
    /// 4. run `after_change` hooks;
    /// 5. broadcast `reload` with the change set, whatever the outcome.
    pub async fn process(&self, changes: ChangeSet) -> RebuildOutcome {
        self.index.invalidate();
        debug!(paths = changes.len(), "processing change set");

        let outcome = match self.rebuild_now().await {
            Ok(snapshot) => RebuildOutcome::Rebuilt {
                version: snapshot.version(),
            },
            Err(err) => {
                let err = format!("{err:#}");
                error!(error = %err, "index rebuild failed; index left stale");
                RebuildOutcome::Failed
            }
        };

        self.hooks.run(
            HookEvent::AfterChange,
            &self.hook_context(),
            HookArgs::Changes(&changes),
        );

        let delivered = self.channel.broadcast(RELOAD_EVENT, changes.to_payload());
        info!(?outcome, delivered, "change set processed");

        outcome
    }

    /// Rebuild the index now, serialized with every other rebuild.
    ///
    /// The reindex operation runs on the blocking pool and holds the rebuild
    /// lock until it has published. Dropping this future stops waiting for
    /// the result but not the rebuild; the next rebuild still waits for it.
    pub async fn rebuild_now(&self) -> anyhow::Result<Arc<IndexSnapshot>> {
        let guard = Arc::clone(&self.rebuild_lock).lock_owned().await;

        let started_at = self.index.generation();
        let reindexer = Arc::clone(&self.reindexer);
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || -> anyhow::Result<Arc<IndexSnapshot>> {
            let _guard = guard;
            let entries = reindexer.reindex()?;
            Ok(index.publish(entries, started_at))
        })
        .await
        .map_err(|err| anyhow!("rebuild task did not complete: {err}"))?
    }
}

impl ChangeHandler for ReindexCoordinator {
    fn on_change(&self, changes: ChangeSet) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.process(changes).await;
        })
    }
}
