//! One ssh-agent per private key.
//!
//! Every key gets its own agent listening on `<agents-dir>/<key name>`,
//! running from a private copy of the agent binary named
//! `ssh-agent-<key name>` so process listings tell agents apart. Nothing is
//! remembered between runs: the socket on disk and a liveness probe decide
//! whether an agent can be reused.

mod lock;
mod probe;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use lock::KeyLock;
pub use probe::{probe, AgentState};

use settings::constants;
use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

/// Failures that leave the agent environment in an unknown state.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("key path {0:?} has no file name")]
    InvalidKey(PathBuf),
    #[error("cannot prepare agents directory {path:?}: {source}")]
    AgentsDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot probe agent with {path:?}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot remove stale socket {path:?}: {source}")]
    StaleSocket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot copy agent binary to {path:?}: {source}")]
    Materialize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to run agent {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("agent for {key} exited with {status}")]
    StartFailed { key: String, status: ExitStatus },
}

/// Base file name of a private key; names its socket and agent copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyIdentifier(String);

impl KeyIdentifier {
    pub fn from_key_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        if name.is_empty() {
            return None;
        }
        Some(Self(name.into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the agent for one key lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    pub key: KeyIdentifier,
    pub socket: PathBuf,
    pub executable: PathBuf,
    pub lock_file: PathBuf,
}

/// Creates, probes and restarts per-key agents under one directory.
#[derive(Debug, Clone)]
pub struct AgentStore {
    agents_dir: PathBuf,
    ssh_agent: PathBuf,
    ssh_add: PathBuf,
    settle_delay: Duration,
    locking: bool,
}

impl AgentStore {
    pub fn new(
        agents_dir: impl Into<PathBuf>,
        ssh_agent: impl Into<PathBuf>,
        ssh_add: impl Into<PathBuf>,
    ) -> Self {
        Self {
            agents_dir: agents_dir.into(),
            ssh_agent: ssh_agent.into(),
            ssh_add: ssh_add.into(),
            settle_delay: constants::agent::DEFAULT_SETTLE_DELAY,
            locking: true,
        }
    }

    pub fn from_config(config: &settings::Config) -> Self {
        Self::new(config.agents_dir(), &config.ssh_agent, &config.ssh_add)
            .with_settle_delay(config.settle_delay())
            .with_locking(config.lock)
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Without locking, two invocations for the same key can both see a dead
    /// agent and both restart it; the later start wins the socket.
    pub fn with_locking(mut self, locking: bool) -> Self {
        self.locking = locking;
        self
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    pub fn handle(&self, key: &KeyIdentifier) -> AgentHandle {
        AgentHandle {
            key: key.clone(),
            socket: self.agents_dir.join(key.as_str()),
            executable: self
                .agents_dir
                .join(format!("{}{}", constants::agent::EXECUTABLE_PREFIX, key)),
            lock_file: self
                .agents_dir
                .join(format!("{}{}", key, constants::agent::LOCK_SUFFIX)),
        }
    }

    pub fn probe(&self, handle: &AgentHandle) -> Result<AgentState, AgentError> {
        probe(&self.ssh_add, &handle.socket).map_err(|source| AgentError::Probe {
            path: self.ssh_add.clone(),
            source,
        })
    }

    /// Make sure a live agent for `keyfile` is listening on its socket.
    ///
    /// Reuses a live agent; otherwise starts a fresh one and adds the key.
    /// `keyfile` must already exist.
    pub fn ensure(&self, keyfile: &Path) -> Result<AgentHandle, AgentError> {
        let key = KeyIdentifier::from_key_path(keyfile)
            .ok_or_else(|| AgentError::InvalidKey(keyfile.to_path_buf()))?;
        self.create_agents_dir()?;
        let handle = self.handle(&key);

        let _lock = if self.locking {
            Some(
                KeyLock::acquire(&handle.lock_file).map_err(|source| AgentError::Lock {
                    path: handle.lock_file.clone(),
                    source,
                })?,
            )
        } else {
            None
        };

        match self.probe(&handle)? {
            AgentState::Alive => {
                tracing::debug!("reusing agent for {} at {}", key, handle.socket.display());
            }
            AgentState::Dead => {
                tracing::info!("agent for {} is dead, restarting", key);
                self.start(&handle, keyfile)?;
            }
            AgentState::Absent => {
                tracing::debug!("no agent for {}, starting one", key);
                self.start(&handle, keyfile)?;
            }
        }
        Ok(handle)
    }

    fn create_agents_dir(&self) -> Result<(), AgentError> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(constants::agent::DIR_MODE)
            .create(&self.agents_dir)
            .map_err(|source| AgentError::AgentsDir {
                path: self.agents_dir.clone(),
                source,
            })
    }

    fn start(&self, handle: &AgentHandle, keyfile: &Path) -> Result<(), AgentError> {
        match fs::remove_file(&handle.socket) {
            Ok(()) => tracing::debug!("removed stale socket {}", handle.socket.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(AgentError::StaleSocket {
                    path: handle.socket.clone(),
                    source,
                })
            }
        }

        self.materialize(handle)
            .map_err(|source| AgentError::Materialize {
                path: handle.executable.clone(),
                source,
            })?;

        let status = Command::new(&handle.executable)
            .arg("-a")
            .arg(&handle.socket)
            .env_remove(constants::agent::AUTH_SOCK_ENV)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|source| AgentError::Spawn {
                path: handle.executable.clone(),
                source,
            })?;
        if !status.success() {
            return Err(AgentError::StartFailed {
                key: handle.key.to_string(),
                status,
            });
        }
        tracing::info!(
            "started agent for {} on {}",
            handle.key,
            handle.socket.display()
        );

        std::thread::sleep(self.settle_delay);
        self.add_key(handle, keyfile);
        Ok(())
    }

    /// Copy the agent binary next to the socket under a per-key name.
    ///
    /// The copy goes through a temporary sibling and a rename, so an old agent
    /// still executing the previous copy never sees its file rewritten.
    fn materialize(&self, handle: &AgentHandle) -> io::Result<()> {
        let staging = self.agents_dir.join(format!(
            ".{}{}.{}",
            constants::agent::EXECUTABLE_PREFIX,
            handle.key,
            std::process::id()
        ));
        let result = fs::copy(&self.ssh_agent, &staging)
            .and_then(|_| {
                fs::set_permissions(
                    &staging,
                    fs::Permissions::from_mode(constants::agent::EXECUTABLE_MODE),
                )
            })
            .and_then(|_| fs::rename(&staging, &handle.executable));
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        result
    }

    /// Load the key into a freshly started agent. Failure is not fatal: the
    /// agent exists and ssh can still prompt for the passphrase itself.
    fn add_key(&self, handle: &AgentHandle, keyfile: &Path) {
        let output = Command::new(&self.ssh_add)
            .arg(keyfile)
            .env(constants::agent::AUTH_SOCK_ENV, &handle.socket)
            .stdin(Stdio::inherit())
            .output();

        match output {
            Ok(output) if output.status.success() => {
                tracing::debug!("added {} to its agent", keyfile.display());
            }
            Ok(output) => {
                tracing::warn!(
                    "failed to add {} to agent ({}): {}{}",
                    keyfile.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr).trim_end()
                );
            }
            Err(e) => {
                tracing::warn!("failed to run {}: {}", self.ssh_add.display(), e);
            }
        }
    }
}
