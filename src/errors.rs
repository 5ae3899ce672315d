// src/errors.rs

//! Crate-wide error types.
//!
//! Only start-up failures are ever returned to a caller of the pipeline.
//! Everything that can go wrong once the pipeline is running (rebuilds,
//! hooks, deliveries, shutdown) is recovered locally and logged; the types
//! for those live here too so log lines carry a consistent shape.

use std::path::PathBuf;

use thiserror::Error;

use crate::hooks::HookEvent;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of a single watch source.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watch source '{source_name}': root {root:?} does not exist")]
    MissingRoot { source_name: String, root: PathBuf },

    #[error("watch source '{source_name}': failed to start monitoring {root:?}: {cause}")]
    Start {
        source_name: String,
        root: PathBuf,
        #[source]
        cause: notify::Error,
    },

    #[error("watch source '{source_name}': failed to create watcher: {cause}")]
    Init {
        source_name: String,
        #[source]
        cause: notify::Error,
    },

    #[error("watch source '{source_name}': already started")]
    AlreadyStarted { source_name: String },

    #[error("watch source '{source_name}': failed to stop cleanly: {cause}")]
    Stop {
        source_name: String,
        #[source]
        cause: notify::Error,
    },

    #[error("invalid include pattern '{pattern}': {cause}")]
    InvalidInclude {
        pattern: String,
        #[source]
        cause: regex::Error,
    },

    #[error("invalid exclude glob '{pattern}': {cause}")]
    InvalidExclude {
        pattern: String,
        #[source]
        cause: globset::Error,
    },
}

/// A hook callback returned an error or panicked.
#[derive(Error, Debug)]
#[error("{event} hook #{position} failed: {message}")]
pub struct HookError {
    pub event: HookEvent,
    pub position: usize,
    pub message: String,
}

/// Delivery of one event to one subscriber failed; the subscriber is dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber queue is full")]
    Full,
    #[error("subscriber has detached")]
    Closed,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LiveError>;
