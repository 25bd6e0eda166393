//! Fake OpenSSH binaries for tests.
//!
//! `ssh`, `ssh-agent` and `ssh-add` are small shell scripts in a temp
//! directory. Every invocation appends a line to a shared log so tests can
//! count agent starts, probes and key adds. Like the real agent, the fake
//! refuses to bind over an existing socket file.

use settings::constants;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct FakeOpenSsh {
    dir: TempDir,
    pub ssh: PathBuf,
    pub ssh_agent: PathBuf,
    pub ssh_add: PathBuf,
    pub agents_dir: PathBuf,
    log: PathBuf,
    hosts: PathBuf,
    keys: PathBuf,
}

impl FakeOpenSsh {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let root = dir.path();
        let log = root.join("calls.log");
        let hosts = root.join("hosts");
        let keys = root.join("keys");
        let bin = root.join("bin");
        for d in [&hosts, &keys, &bin] {
            std::fs::create_dir_all(d).expect("Failed to create fixture dir");
        }
        std::fs::write(&log, "").expect("Failed to create call log");

        // Like OpenSSH, report the default identity list and a disabled
        // LocalCommand unless the host's output names its own.
        let defaults = root.join("openssh-defaults");
        let default_lines: String = constants::openssh::DEFAULT_IDENTITY_FILES
            .iter()
            .map(|file| format!("identityfile {file}\n"))
            .collect();
        std::fs::write(&defaults, default_lines).expect("Failed to write defaults");

        let ssh = write_script(
            &bin.join("ssh"),
            &format!(
                r#"echo "ssh $*" >> "{log}"
for last; do :; done
if [ -f "{hosts}/$last.fail" ]; then echo "no such host" >&2; exit 255; fi
config="{hosts}/$last"
if [ -f "$config" ]; then cat "$config"; fi
if ! grep -qi '^identityfile ' "$config" 2>/dev/null; then cat "{defaults}"; fi
if ! grep -qi '^permitlocalcommand ' "$config" 2>/dev/null; then echo "permitlocalcommand no"; fi
exit 0"#,
                log = log.display(),
                hosts = hosts.display(),
                defaults = defaults.display(),
            ),
        );
        let ssh_agent = write_script(
            &bin.join("ssh-agent"),
            &format!(
                r#"if [ -e "$2" ]; then
  echo "agent-stale $2" >> "{log}"
  echo "$2: address already in use" >&2
  exit 1
fi
echo "agent $(basename "$0") $*" >> "{log}"
if [ -f "{root}/agent.fail" ]; then echo "cannot bind" >&2; exit 1; fi
: > "$2"
: > "$2.alive"
echo "SSH_AUTH_SOCK=$2; export SSH_AUTH_SOCK;"
exit 0"#,
                log = log.display(),
                root = root.display(),
            ),
        );
        let ssh_add = write_script(
            &bin.join("ssh-add"),
            &format!(
                r#"if [ "$1" = "-l" ]; then
  echo "probe $SSH_AUTH_SOCK" >> "{log}"
  if [ -f "$SSH_AUTH_SOCK.alive" ]; then exit 1; fi
  exit 2
fi
echo "add $1 $SSH_AUTH_SOCK" >> "{log}"
if [ -f "{root}/add.fail" ]; then echo "bad passphrase" >&2; exit 1; fi
exit 0"#,
                log = log.display(),
                root = root.display(),
            ),
        );

        let agents_dir = root.join("agents");
        Self {
            dir,
            ssh,
            ssh_agent,
            ssh_add,
            agents_dir,
            log,
            hosts,
            keys,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an (empty) private key file and return its path.
    pub fn key(&self, name: &str) -> PathBuf {
        let path = self.keys.join(name);
        std::fs::write(&path, "fake key").expect("Failed to write key");
        path
    }

    /// Path of a key that was never created.
    pub fn missing_key(&self, name: &str) -> PathBuf {
        self.keys.join(name)
    }

    /// Make `ssh -G <host>` print `output`, followed by OpenSSH's defaults
    /// for `identityfile` and `permitlocalcommand` when `output` lacks them.
    pub fn set_host_config(&self, host: &str, output: &str) {
        std::fs::write(self.hosts.join(host), output).expect("Failed to write host config");
    }

    /// Make `ssh -G <host>` exit 255.
    pub fn fail_host_config(&self, host: &str) {
        std::fs::write(self.hosts.join(format!("{host}.fail")), "")
            .expect("Failed to write marker");
    }

    pub fn fail_agent_start(&self) {
        std::fs::write(self.path().join("agent.fail"), "").expect("Failed to write marker");
    }

    pub fn fail_key_add(&self) {
        std::fs::write(self.path().join("add.fail"), "").expect("Failed to write marker");
    }

    /// Simulate the agent for `key` dying while its socket stays behind.
    pub fn kill_agent(&self, key: &str) {
        let marker = self.agents_dir.join(format!("{key}.alive"));
        std::fs::remove_file(marker).expect("Agent was not running");
    }

    pub fn calls(&self) -> Vec<String> {
        let log = std::fs::read(&self.log).expect("Failed to read call log");
        String::from_utf8_lossy(&log)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Number of logged calls starting with `prefix` (`ssh`, `agent`,
    /// `agent-stale`, `probe`, `add`).
    pub fn count(&self, prefix: &str) -> usize {
        let prefix = format!("{prefix} ");
        self.calls()
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .count()
    }
}

impl Default for FakeOpenSsh {
    fn default() -> Self {
        Self::new()
    }
}

fn write_script(path: &Path, body: &str) -> PathBuf {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
    path.to_path_buf()
}
