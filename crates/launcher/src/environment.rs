//! The agent socket binding handed to every child process.

use settings::constants::agent::AUTH_SOCK_ENV;
use std::path::{Path, PathBuf};
use std::process::Command;

/// `SSH_AUTH_SOCK` as keyssh wants children to see it.
///
/// Starts cleared, so a binding inherited from the parent shell never reaches
/// the config query, the agents or the final client. Bound at most once, to
/// the socket of the agent that holds the resolved key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentEnvironment {
    auth_sock: Option<PathBuf>,
}

impl AgentEnvironment {
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, socket: &Path) {
        tracing::debug!("{}={}", AUTH_SOCK_ENV, socket.display());
        self.auth_sock = Some(socket.to_path_buf());
    }

    pub fn auth_sock(&self) -> Option<&Path> {
        self.auth_sock.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.auth_sock.is_some()
    }

    /// Write the binding onto `command`, removing any inherited value.
    pub fn apply<'a>(&self, command: &'a mut Command) -> &'a mut Command {
        match &self.auth_sock {
            Some(socket) => command.env(AUTH_SOCK_ENV, socket),
            None => command.env_remove(AUTH_SOCK_ENV),
        }
    }
}
