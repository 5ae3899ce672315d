// src/hooks.rs

//! User-registered lifecycle callbacks.
//!
//! Callbacks run synchronously, in registration order. A callback that
//! returns an error or panics is logged and skipped; it never stops the
//! callbacks registered after it.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, error};

use crate::broadcast::{LiveChannel, Payload};
use crate::errors::HookError;
use crate::index::Index;
use crate::watch::ChangeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    AfterInitialize,
    AfterChange,
    BeforeExit,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookEvent::AfterInitialize => "after_initialize",
            HookEvent::AfterChange => "after_change",
            HookEvent::BeforeExit => "before_exit",
        };
        f.write_str(s)
    }
}

/// Arguments passed to a hook, depending on the event.
#[derive(Debug, Clone, Copy)]
pub enum HookArgs<'a> {
    None,
    Changes(&'a ChangeSet),
}

impl<'a> HookArgs<'a> {
    pub fn changes(&self) -> Option<&'a ChangeSet> {
        match *self {
            HookArgs::Changes(changes) => Some(changes),
            HookArgs::None => None,
        }
    }
}

/// What a hook can reach: the index and the live channel.
#[derive(Debug, Clone)]
pub struct HookContext {
    index: Arc<Index>,
    channel: Arc<LiveChannel>,
}

impl HookContext {
    pub fn new(index: Arc<Index>, channel: Arc<LiveChannel>) -> Self {
        Self { index, channel }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Publish a custom event to connected viewers.
    pub fn broadcast(&self, name: &str, payload: Payload) -> usize {
        self.channel.broadcast(name, payload)
    }
}

pub type HookFn = dyn Fn(&HookContext, &HookArgs<'_>) -> anyhow::Result<()> + Send + Sync;

/// Ordered callbacks per lifecycle event.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<HookEvent, Vec<Arc<HookFn>>>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("after_initialize", &self.len(HookEvent::AfterInitialize))
            .field("after_change", &self.len(HookEvent::AfterChange))
            .field("before_exit", &self.len(HookEvent::BeforeExit))
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback for `event`.
    pub fn register<F>(&self, event: HookEvent, callback: F)
    where
        F: Fn(&HookContext, &HookArgs<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        let list = hooks.entry(event).or_default();
        list.push(Arc::new(callback));
        debug!(%event, position = list.len(), "hook registered");
    }

    pub fn after_initialize<F>(&self, callback: F)
    where
        F: Fn(&HookContext, &HookArgs<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookEvent::AfterInitialize, callback);
    }

    pub fn after_change<F>(&self, callback: F)
    where
        F: Fn(&HookContext, &HookArgs<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookEvent::AfterChange, callback);
    }

    pub fn before_exit<F>(&self, callback: F)
    where
        F: Fn(&HookContext, &HookArgs<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(HookEvent::BeforeExit, callback);
    }

    pub fn len(&self, event: HookEvent) -> usize {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .map_or(0, Vec::len)
    }

    /// Run every callback for `event`. Returns the number that failed.
    pub fn run(&self, event: HookEvent, ctx: &HookContext, args: HookArgs<'_>) -> usize {
        // Snapshot the list so callbacks may register further hooks.
        let callbacks: Vec<Arc<HookFn>> = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .cloned()
            .unwrap_or_default();

        if callbacks.is_empty() {
            return 0;
        }
        debug!(%event, count = callbacks.len(), "running hooks");

        let mut failed = 0;
        for (position, callback) in callbacks.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(ctx, &args)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(panic) => panic_message(panic.as_ref()),
            };

            failed += 1;
            let err = HookError {
                event,
                position,
                message,
            };
            error!(error = %err, "hook failed");
        }
        failed
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn ctx() -> HookContext {
        HookContext::new(Arc::new(Index::new()), Arc::new(LiveChannel::disabled()))
    }

    #[test]
    fn runs_in_registration_order() {
        let registry = HookRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            registry.after_initialize(move |_, _| {
                seen.lock().unwrap().push(i);
                Ok(())
            });
        }

        assert_eq!(registry.run(HookEvent::AfterInitialize, &ctx(), HookArgs::None), 0);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn failures_and_panics_do_not_stop_later_hooks() {
        let registry = HookRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.after_change(|_, _| Err(anyhow::anyhow!("boom")));
        registry.after_change(|_, _| panic!("hook exploded"));
        {
            let seen = Arc::clone(&seen);
            registry.after_change(move |_, args| {
                let changes = args.changes().expect("changes passed");
                seen.lock().unwrap().push(changes.len());
                Ok(())
            });
        }

        let changes = ChangeSet::new(vec![PathBuf::from("/a.rb")], vec![], vec![]);
        let failed = registry.run(HookEvent::AfterChange, &ctx(), HookArgs::Changes(&changes));

        assert_eq!(failed, 2);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn events_are_independent() {
        let registry = HookRegistry::new();
        registry.before_exit(|_, _| Ok(()));

        assert_eq!(registry.len(HookEvent::BeforeExit), 1);
        assert_eq!(registry.len(HookEvent::AfterChange), 0);
        assert_eq!(registry.run(HookEvent::AfterChange, &ctx(), HookArgs::None), 0);
    }

    #[test]
    fn hooks_may_register_hooks() {
        let registry = Arc::new(HookRegistry::new());
        {
            let inner = Arc::clone(&registry);
            registry.after_initialize(move |_, _| {
                inner.before_exit(|_, _| Ok(()));
                Ok(())
            });
        }

        registry.run(HookEvent::AfterInitialize, &ctx(), HookArgs::None);
        assert_eq!(registry.len(HookEvent::BeforeExit), 1);
    }
}
