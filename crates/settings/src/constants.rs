//! Centralized configuration constants for keyssh.
//!
//! Organized by the external collaborator or component they describe.

/// The real ssh client we hand off to.
pub mod client {
    /// Default path of the wrapped ssh client.
    pub const DEFAULT_SSH: &str = "/usr/bin/ssh";
    /// `argv[0]` given to the exec'd client.
    pub const ARGV0: &str = "ssh";
    /// Shell used for the host's `LocalCommand`.
    pub const SHELL: &str = "/bin/sh";
    /// Exit status when the agent environment could not be prepared.
    pub const FATAL_EXIT_CODE: i32 = 1;
    /// Exit status when the client itself could not be executed (matches ssh).
    pub const EXEC_FAILURE_EXIT_CODE: i32 = 255;
}

/// Per-key agent layout and lifecycle.
pub mod agent {
    use std::time::Duration;

    /// Environment variable naming the agent socket.
    pub const AUTH_SOCK_ENV: &str = "SSH_AUTH_SOCK";
    /// Default path of the agent binary that gets copied per key.
    pub const DEFAULT_SSH_AGENT: &str = "/usr/bin/ssh-agent";
    /// Default path of the list/add helper.
    pub const DEFAULT_SSH_ADD: &str = "/usr/bin/ssh-add";
    /// Prefix of the per-key agent executable copy.
    pub const EXECUTABLE_PREFIX: &str = "ssh-agent-";
    /// Suffix of the per-key lock file.
    pub const LOCK_SUFFIX: &str = ".lock";
    /// Mode of the agents directory.
    pub const DIR_MODE: u32 = 0o700;
    /// Mode of the agent executable copy.
    pub const EXECUTABLE_MODE: u32 = 0o700;
    /// Delay between agent startup and adding the key.
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);
}

/// Exit codes of `ssh-add -l`.
pub mod probe {
    /// Agent reachable, at least one key loaded.
    pub const HAS_KEYS: i32 = 0;
    /// Agent reachable, no keys loaded.
    pub const NO_KEYS: i32 = 1;
    /// Agent unreachable.
    pub const UNREACHABLE: i32 = 2;
}

/// What `ssh -G` reports when the user configured nothing.
pub mod openssh {
    /// Identity files OpenSSH lists for a host without any `IdentityFile`.
    pub const DEFAULT_IDENTITY_FILES: &[&str] = &[
        "~/.ssh/id_rsa",
        "~/.ssh/id_ecdsa",
        "~/.ssh/id_ecdsa_sk",
        "~/.ssh/id_ed25519",
        "~/.ssh/id_ed25519_sk",
        "~/.ssh/id_xmss",
        "~/.ssh/id_dsa",
    ];
    /// Defaults that some OpenSSH releases leave out of that list.
    pub const OPTIONAL_DEFAULT_IDENTITY_FILES: &[&str] = &["~/.ssh/id_xmss", "~/.ssh/id_dsa"];
}

/// Environment variables read by keyssh itself.
pub mod env {
    /// Enables trace logging when set.
    pub const DEBUG: &str = "KEYSSH_DEBUG";
    pub const SSH: &str = "KEYSSH_SSH";
    pub const SSH_AGENT: &str = "KEYSSH_SSH_AGENT";
    pub const SSH_ADD: &str = "KEYSSH_SSH_ADD";
    pub const AGENTS_DIR: &str = "KEYSSH_AGENTS_DIR";
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    /// Settings files should be tiny; anything larger is suspicious.
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;
}
