// src/engine/listeners.rs

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::errors::WatchError;
use crate::watch::{ChangeHandler, WatchSource};

/// The set of running watch sources.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    sources: Mutex<Vec<Arc<WatchSource>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `source` and keep it. A start failure is returned and the
    /// source is not registered.
    pub fn register(
        &self,
        source: Arc<WatchSource>,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<(), WatchError> {
        source.start(handler)?;
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Stop every source in registration order and clear the registry.
    ///
    /// A source that fails to stop is logged and the rest are still
    /// stopped. Calling this again, or on an empty registry, does nothing.
    /// Returns the number of sources that did not stop cleanly.
    pub fn stop_all(&self) -> usize {
        let sources = std::mem::take(
            &mut *self
                .sources
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if sources.is_empty() {
            debug!("no listeners to stop");
            return 0;
        }

        info!(count = sources.len(), "stopping listeners");
        let mut failed = 0;
        for source in sources {
            if let Err(err) = source.stop() {
                failed += 1;
                warn!(source = %source.name(), error = %err, "listener did not stop cleanly; continuing shutdown");
            }
        }
        failed
    }
}
