//! Configuration system for keyssh.
//!
//! Provides compile-time constants and TOML config file support.

pub mod constants;
pub mod file;

pub use file::{config_path, load_config, load_config_from, Config};
