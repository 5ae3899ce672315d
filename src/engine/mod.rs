// src/engine/mod.rs

//! Orchestration engine for preview-live.
//!
//! This module ties together:
//! - the reindex coordinator (change sets → rebuild → hooks → `reload`)
//! - the listener registry (running watch sources)
//! - the lifecycle state machine
//! - the [`LiveContext`] that owns all of the above plus the index, the
//!   hook registry and the live channel

pub mod context;
pub mod coordinator;
pub mod lifecycle;
pub mod listeners;

pub use context::{BootReport, LiveContext};
pub use coordinator::{RebuildOutcome, ReindexCoordinator};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use listeners::ListenerRegistry;
