//! Where effective host configuration comes from.

use settings::constants;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

/// Why an effective-config query produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config query exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Produces `directive value` lines describing a host's effective config.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigSource {
    fn query(&self, host: &str) -> Result<String, QueryError>;
}

/// Asks the real client via `ssh -G`.
#[derive(Debug, Clone)]
pub struct SshConfigSource {
    ssh: PathBuf,
    extra_args: Vec<OsString>,
}

impl SshConfigSource {
    pub fn new(ssh: impl Into<PathBuf>) -> Self {
        Self {
            ssh: ssh.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments placed before `-G`, e.g. the user's `-F` and `-o` flags.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl ConfigSource for SshConfigSource {
    fn query(&self, host: &str) -> Result<String, QueryError> {
        tracing::debug!("querying effective ssh config for {}", host);
        let output = Command::new(&self.ssh)
            .args(&self.extra_args)
            .arg("-G")
            .arg(host)
            .env_remove(constants::agent::AUTH_SOCK_ENV)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| QueryError::Spawn {
                program: self.ssh.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(QueryError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn fake_ssh(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("ssh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    #[serial]
    fn passes_extra_args_before_dash_g() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = fake_ssh(dir.path(), r#"echo "args $*""#);
        let source = SshConfigSource::new(ssh).with_args(["-F", "/tmp/alt"]);
        let output = source.query("example.com").unwrap();
        assert_eq!(output.trim(), "args -F /tmp/alt -G example.com");
    }

    #[test]
    #[serial]
    fn does_not_leak_agent_socket_into_query() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = fake_ssh(dir.path(), r#"echo "sock ${SSH_AUTH_SOCK:-unset}""#);
        let output = SshConfigSource::new(ssh).query("host").unwrap();
        assert_eq!(output.trim(), "sock unset");
    }

    #[test]
    #[serial]
    fn non_zero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = fake_ssh(dir.path(), "echo 'bad host' >&2; exit 255");
        let err = SshConfigSource::new(ssh).query("host").unwrap_err();
        match err {
            QueryError::Failed { stderr, .. } => assert_eq!(stderr, "bad host"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[serial]
    fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SshConfigSource::new(dir.path().join("nope"))
            .query("host")
            .unwrap_err();
        assert!(matches!(err, QueryError::Spawn { .. }));
    }
}
