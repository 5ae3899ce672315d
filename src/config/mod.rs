// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into a [`Settings`] value (`validate.rs`).
//!
//! The pipeline itself only ever sees a validated [`Settings`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{IndexSection, LiveSection, RawSettings, Settings, SourceConfig};
