//! Flecs core
//!
//! Configuration model for Flecs deployments and the loader that turns a
//! `flecs.yaml` document (plus an optional environment) into a fully resolved,
//! read-only [`Config`].

pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, Result};
pub use loader::{LoadOptions, find_config_file, load_config, parse_config};
pub use model::*;
