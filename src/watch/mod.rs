// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling the include regex / exclude globs of each watch source.
//! - Wiring up a cross-platform filesystem watcher (`notify`), either native
//!   or polling.
//! - Debouncing raw notifications into one [`ChangeSet`] per window.
//!
//! It does **not** know about the index or the broadcast channel; it only
//! hands change sets to a [`ChangeHandler`].

pub mod changeset;
pub mod filter;
pub mod source;

pub use changeset::{ChangeSet, Coalescer};
pub use filter::{relative_str, PathFilter};
pub use source::{raw_changes, ChangeHandler, RawChange, WatchSource, WatchSourceSpec};
