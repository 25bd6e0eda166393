//! Centralized path management for keyssh.
//!
//! All well-known directories are lazily initialized and cached.
//! Use `set_home_dir` before first access to override for testing.

use std::path::PathBuf;
use std::sync::OnceLock;

static HOME_DIR: OnceLock<PathBuf> = OnceLock::new();
static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();
static AGENTS_DIR: OnceLock<PathBuf> = OnceLock::new();

/// The user's home directory, falling back to the current directory.
pub fn home_dir() -> &'static PathBuf {
    HOME_DIR.get_or_init(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}

/// ~/.config/keyssh (or platform equivalent)
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| home_dir().join(".config"))
            .join("keyssh")
    })
}

/// ~/.ssh/agents
///
/// One socket, one agent executable copy and one lock file per key live here.
pub fn agents_dir() -> &'static PathBuf {
    AGENTS_DIR.get_or_init(|| home_dir().join(".ssh").join("agents"))
}

/// Override home dir (must be called before first access). For testing.
pub fn set_home_dir(path: PathBuf) {
    let _ = HOME_DIR.set(path);
}

/// Config file path: config_dir()/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
