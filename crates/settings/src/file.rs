//! TOML config file support.
//!
//! Config location: `~/.config/keyssh/config.toml`

use crate::constants;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// The real ssh client to exec.
    pub ssh: PathBuf,
    /// Agent binary copied once per key.
    pub ssh_agent: PathBuf,
    /// Helper used to probe agents and add keys.
    pub ssh_add: PathBuf,
    /// Directory holding per-key sockets and agent copies. `~` is expanded.
    pub agents_dir: Option<String>,
    /// Milliseconds to wait between agent startup and adding the key.
    pub settle_delay_ms: u64,
    /// Serialize concurrent invocations for the same key on a lock file.
    pub lock: bool,
    /// Run the host's `LocalCommand` before handing off.
    pub run_local_command: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh: PathBuf::from(constants::client::DEFAULT_SSH),
            ssh_agent: PathBuf::from(constants::agent::DEFAULT_SSH_AGENT),
            ssh_add: PathBuf::from(constants::agent::DEFAULT_SSH_ADD),
            agents_dir: None,
            settle_delay_ms: constants::agent::DEFAULT_SETTLE_DELAY.as_millis() as u64,
            lock: true,
            run_local_command: true,
        }
    }
}

impl Config {
    /// Resolved agents directory.
    pub fn agents_dir(&self) -> PathBuf {
        match &self.agents_dir {
            Some(dir) => util::expand_home(dir),
            None => keyssh_paths::agents_dir().clone(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Apply `KEYSSH_*` overrides. `lookup` is `std::env::var` in production.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ssh) = lookup(constants::env::SSH) {
            self.ssh = util::expand_home(&ssh);
        }
        if let Some(agent) = lookup(constants::env::SSH_AGENT) {
            self.ssh_agent = util::expand_home(&agent);
        }
        if let Some(add) = lookup(constants::env::SSH_ADD) {
            self.ssh_add = util::expand_home(&add);
        }
        if let Some(dir) = lookup(constants::env::AGENTS_DIR) {
            self.agents_dir = Some(dir);
        }
        self
    }
}

/// Return the config file path.
pub fn config_path() -> PathBuf {
    keyssh_paths::config_file()
}

/// Load the config file with environment overrides applied.
/// Returns defaults on any error.
pub fn load_config() -> Config {
    load_config_from(&config_path()).with_env_overrides(|key| std::env::var(key).ok())
}

/// Load and parse a config file. Returns default on any error.
pub fn load_config_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > constants::settings::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = Config::default();
        assert_eq!(cfg.ssh, PathBuf::from("/usr/bin/ssh"));
        assert_eq!(cfg.settle_delay(), constants::agent::DEFAULT_SETTLE_DELAY);
        assert!(cfg.lock);
        assert!(cfg.run_local_command);
        assert!(cfg.agents_dir.is_none());
    }

    #[test]
    fn parses_minimal_toml() {
        let cfg: Config = toml::from_str(r#"ssh = "/opt/openssh/bin/ssh""#).unwrap();
        assert_eq!(cfg.ssh, PathBuf::from("/opt/openssh/bin/ssh"));
        assert_eq!(cfg.ssh_add, PathBuf::from(constants::agent::DEFAULT_SSH_ADD));
    }

    #[test]
    fn parses_full_toml() {
        let toml_str = r#"
ssh = "/usr/local/bin/ssh"
ssh-agent = "/usr/local/bin/ssh-agent"
ssh-add = "/usr/local/bin/ssh-add"
agents-dir = "/tmp/agents"
settle-delay-ms = 50
lock = false
run-local-command = false
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            cfg,
            Config {
                ssh: PathBuf::from("/usr/local/bin/ssh"),
                ssh_agent: PathBuf::from("/usr/local/bin/ssh-agent"),
                ssh_add: PathBuf::from("/usr/local/bin/ssh-add"),
                agents_dir: Some("/tmp/agents".to_string()),
                settle_delay_ms: 50,
                lock: false,
                run_local_command: false,
            }
        );
        assert_eq!(cfg.agents_dir(), PathBuf::from("/tmp/agents"));
        assert_eq!(cfg.settle_delay(), Duration::from_millis(50));
    }

    #[test]
    fn ignores_unknown_keys() {
        let toml_str = r#"
ssh = "/usr/bin/ssh"
unknown-key = "whatever"
"#;
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_ok());
    }

    #[test]
    fn empty_string_parses_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn agents_dir_defaults_to_dot_ssh_agents() {
        assert!(Config::default().agents_dir().ends_with(".ssh/agents"));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let cfg = Config::default().with_env_overrides(|key| match key {
            "KEYSSH_SSH" => Some("/opt/ssh".to_string()),
            "KEYSSH_AGENTS_DIR" => Some("/run/agents".to_string()),
            _ => None,
        });
        assert_eq!(cfg.ssh, PathBuf::from("/opt/ssh"));
        assert_eq!(cfg.ssh_agent, PathBuf::from(constants::agent::DEFAULT_SSH_AGENT));
        assert_eq!(cfg.agents_dir(), PathBuf::from("/run/agents"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ssh = [not toml").unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn oversized_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let padding = "#".repeat(constants::settings::MAX_FILE_SIZE as usize + 1);
        std::fs::write(&path, format!("lock = false\n{padding}")).unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "settle-delay-ms = 0\nlock = false\n").unwrap();
        let cfg = load_config_from(&path);
        assert_eq!(cfg.settle_delay_ms, 0);
        assert!(!cfg.lock);
    }
}
