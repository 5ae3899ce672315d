// src/index/mod.rs

//! The derived index of preview and page files.
//!
//! - [`Index`] holds the current snapshot and its freshness.
//! - [`Reindexer`] is the rebuild operation; [`FsReindexer`] is the default.
//! - [`registry`] persists a pre-built snapshot for boot without parsing.

pub mod digest;
pub mod registry;
pub mod reindexer;
pub mod snapshot;
pub mod store;

pub use reindexer::{FsReindexer, Reindexer};
pub use snapshot::{IndexEntry, IndexSnapshot};
pub use store::{Index, IndexView};
