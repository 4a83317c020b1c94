// src/config/mod.rs

//! Region descriptions loaded from TOML.
//!
//! - `model.rs` defines the serde data model.
//! - `loader.rs` reads a file from disk.
//! - `validate.rs` checks dependencies and acyclicity.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, ConfigSection, NodeConfig, RawConfigFile};
