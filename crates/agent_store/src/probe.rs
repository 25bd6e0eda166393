//! Agent liveness.

use settings::constants;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// What the filesystem and the agent behind a socket tell us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Socket present and the agent answers.
    Alive,
    /// Socket present but nothing answers.
    Dead,
    /// No socket file.
    Absent,
}

impl AgentState {
    pub fn is_alive(self) -> bool {
        self == Self::Alive
    }
}

/// Probe the agent bound to `socket` with `ssh-add -l`.
///
/// Exit 0 (keys loaded) and 1 (no keys) mean alive. Exit 2 means the agent
/// is unreachable; any other exit is treated the same way. Failing to run
/// `ssh_add` at all is an error: it says nothing about the agent.
pub fn probe(ssh_add: &Path, socket: &Path) -> io::Result<AgentState> {
    if std::fs::symlink_metadata(socket).is_err() {
        return Ok(AgentState::Absent);
    }

    let status = Command::new(ssh_add)
        .arg("-l")
        .env(constants::agent::AUTH_SOCK_ENV, socket)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    let state = match status.code() {
        Some(constants::probe::HAS_KEYS) | Some(constants::probe::NO_KEYS) => AgentState::Alive,
        Some(constants::probe::UNREACHABLE) => AgentState::Dead,
        _ => {
            tracing::debug!("unexpected liveness probe result {}, assuming dead", status);
            AgentState::Dead
        }
    };
    Ok(state)
}
