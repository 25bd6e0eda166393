//! Orchestration of one keyssh invocation.
//!
//! [`Launcher::prepare`] walks the whole sequence up to the point of no
//! return: clear the inherited agent binding, pick the key, make sure its
//! agent is alive, bind the environment. The result is a [`Handoff`], the
//! final command. Nothing about agents or the environment changes after it
//! exists; [`Handoff::exec`] then replaces the process image.

mod environment;

pub use environment::AgentEnvironment;

use agent_store::{AgentError, AgentStore};
use command_line::CommandLine;
use settings::constants;
use ssh_config::{ConfigResolver, HostTarget, SshConfigSource};
use std::ffi::OsString;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use util::ResultExt;

/// Failures that must stop keyssh before it connects.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("cannot prepare ssh agent: {0}")]
    Agent(#[from] AgentError),
    #[error("configured ssh client {0:?} is keyssh itself")]
    Recursion(PathBuf),
}

impl LaunchError {
    pub fn exit_code(&self) -> i32 {
        constants::client::FATAL_EXIT_CODE
    }
}

pub struct Launcher {
    config: settings::Config,
    store: AgentStore,
    current_exe: Option<PathBuf>,
}

impl Launcher {
    pub fn new(config: settings::Config) -> Self {
        let store = AgentStore::from_config(&config);
        Self {
            config,
            store,
            current_exe: std::env::current_exe().ok(),
        }
    }

    /// Path of the running wrapper, used to refuse exec'ing ourselves.
    pub fn with_current_exe(mut self, current_exe: Option<PathBuf>) -> Self {
        self.current_exe = current_exe;
        self
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    /// Prepare the final client invocation for `args` (without `argv[0]`).
    pub fn prepare<I, S>(&self, args: I) -> Result<Handoff, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut env = AgentEnvironment::cleared();
        self.check_not_self()?;

        let command_line = CommandLine::parse(args);
        let target = command_line
            .destination()
            .and_then(HostTarget::from_destination);
        let mut resolver = ConfigResolver::new(
            SshConfigSource::new(&self.config.ssh).with_args(command_line.config_query_args()),
        );

        // An explicit -i wins outright; the config is not consulted at all.
        let (identity, local_command) = match command_line.identity_file() {
            Some(explicit) => {
                tracing::debug!("using identity file from command line: {}", explicit.display());
                (Some(explicit.to_path_buf()), None)
            }
            None => match target.as_ref().and_then(|t| resolver.resolve(t)) {
                Some(record) => (
                    record.identity_file().map(PathBuf::from),
                    record.local_command().map(str::to_string),
                ),
                None => (None, None),
            },
        };

        match identity.map(util::expand_home) {
            Some(keyfile) if keyfile.is_file() => {
                let handle = self.store.ensure(&keyfile)?;
                env.bind(&handle.socket);
            }
            Some(keyfile) => {
                tracing::warn!(
                    "identity file {} does not exist, continuing without an agent",
                    keyfile.display()
                );
            }
            None => tracing::debug!("no identity file configured, continuing without an agent"),
        }

        Ok(Handoff {
            program: self.config.ssh.clone(),
            args: command_line.args().to_vec(),
            env,
            local_command: local_command.filter(|_| self.config.run_local_command),
        })
    }

    fn check_not_self(&self) -> Result<(), LaunchError> {
        let Some(current_exe) = &self.current_exe else {
            return Ok(());
        };
        let (Ok(ssh), Ok(current)) = (
            std::fs::canonicalize(&self.config.ssh),
            std::fs::canonicalize(current_exe),
        ) else {
            return Ok(());
        };
        if ssh == current {
            return Err(LaunchError::Recursion(self.config.ssh.clone()));
        }
        Ok(())
    }
}

/// The final client invocation. Terminal: once built, only the optional
/// local command runs before the process image is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: AgentEnvironment,
    pub local_command: Option<String>,
}

impl Handoff {
    /// The client command with `argv[0]` set to `ssh`.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.arg0(constants::client::ARGV0).args(&self.args);
        self.env.apply(&mut command);
        command
    }

    /// Run the host's `LocalCommand` through the shell, output going straight
    /// to the terminal. Best effort: failures are only logged.
    pub fn run_local_command(&self) -> Option<ExitStatus> {
        let local_command = self.local_command.as_deref()?;
        tracing::debug!("running local command: {}", local_command);

        let mut command = Command::new(constants::client::SHELL);
        command.arg("-c").arg(local_command);
        self.env.apply(&mut command);

        let status = command.status().warn_on_err()?;
        if !status.success() {
            tracing::warn!("local command `{}` exited with {}", local_command, status);
        }
        Some(status)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Replace the current process with the client. Only returns on failure.
    pub fn exec(self) -> io::Error {
        tracing::debug!(
            "exec {} (agent socket: {:?})",
            self.program.display(),
            self.env.auth_sock()
        );
        self.command().exec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ffi::OsStr;

    fn handoff(local_command: Option<&str>) -> Handoff {
        let mut env = AgentEnvironment::cleared();
        env.bind(Path::new("/agents/id_ed25519"));
        Handoff {
            program: PathBuf::from("/usr/bin/ssh"),
            args: vec![OsString::from("-v"), OsString::from("alice@example.com")],
            env,
            local_command: local_command.map(str::to_string),
        }
    }

    #[test]
    fn command_forwards_args_and_binding() {
        let command = handoff(None).command();
        assert_eq!(command.get_program(), OsStr::new("/usr/bin/ssh"));
        assert_eq!(
            command.get_args().collect::<Vec<_>>(),
            vec![OsStr::new("-v"), OsStr::new("alice@example.com")]
        );
        assert!(command
            .get_envs()
            .any(|(k, v)| k == "SSH_AUTH_SOCK" && v == Some(OsStr::new("/agents/id_ed25519"))));
    }

    #[test]
    fn no_local_command_runs_nothing() {
        assert_eq!(handoff(None).run_local_command(), None);
    }

    #[test]
    fn local_command_sees_bound_socket() {
        let status = handoff(Some(r#"test "$SSH_AUTH_SOCK" = /agents/id_ed25519"#))
            .run_local_command()
            .unwrap();
        assert!(status.success());
    }

    #[test]
    fn failing_local_command_is_not_fatal() {
        let status = handoff(Some("exit 3")).run_local_command().unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[test]
    fn refuses_to_exec_itself() {
        let dir = tempfile::tempdir().unwrap();
        let wrapper = dir.path().join("ssh");
        std::fs::write(&wrapper, "").unwrap();
        let config = settings::Config {
            ssh: wrapper.clone(),
            ..settings::Config::default()
        };

        let launcher = Launcher::new(config).with_current_exe(Some(wrapper));
        let err = launcher.prepare(["host"]).unwrap_err();

        assert!(matches!(err, LaunchError::Recursion(_)));
        assert_eq!(err.exit_code(), 1);
    }
}
