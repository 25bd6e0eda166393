//! Shared test utilities for launcher integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

pub use agent_store::test_support::FakeOpenSsh;
use launcher::Launcher;

/// Fake OpenSSH install plus a launcher wired to it.
pub struct TestEnv {
    pub fake: FakeOpenSsh,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            fake: FakeOpenSsh::new(),
        }
    }

    pub fn config(&self) -> settings::Config {
        settings::Config {
            ssh: self.fake.ssh.clone(),
            ssh_agent: self.fake.ssh_agent.clone(),
            ssh_add: self.fake.ssh_add.clone(),
            agents_dir: Some(self.fake.agents_dir.display().to_string()),
            settle_delay_ms: 0,
            lock: true,
            run_local_command: true,
        }
    }

    pub fn launcher(&self) -> Launcher {
        self.launcher_with(self.config())
    }

    pub fn launcher_with(&self, config: settings::Config) -> Launcher {
        Launcher::new(config).with_current_exe(None)
    }

    /// `ssh -G` output naming `identity` and nothing else of interest.
    pub fn host_with_identity(&self, host: &str, identity: &std::path::Path) {
        self.fake.set_host_config(
            host,
            &format!(
                "user alice\nhostname {host}\nidentityfile {}\n",
                identity.display()
            ),
        );
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
