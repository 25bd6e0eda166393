//! Interpretation of the wrapped ssh client's command line.
//!
//! keyssh accepts ssh's entire flag grammar and forwards the argument vector
//! byte-for-byte. Only the few pieces needed to pick a key are inspected:
//! `-i`, `-F`, `-o` and the destination.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Short flags that take a value, either attached (`-p22`) or as the next
/// argument (`-p 22`).
pub const VALUE_FLAGS: &str = "BbcDEeFIiJLlmOoPpQRSWw";

/// Short flags that are plain switches.
pub const SWITCH_FLAGS: &str = "146AaCfGgKkMNnqsTtVvXxYy";

/// What keyssh learned from an ssh command line.
///
/// Paths and options keep their raw bytes; only the destination, which is a
/// host name, is read as (lossy) UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    args: Vec<OsString>,
    identity_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    options: Vec<OsString>,
    destination: Option<String>,
}

impl CommandLine {
    /// Parse ssh arguments (without the program name).
    ///
    /// Never fails: unknown flags are treated as switches and skipped, and a
    /// value flag at the very end simply has no value.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let mut parsed = Self::default();

        let mut index = 0;
        while index < args.len() {
            let arg = args[index].as_bytes();

            if arg == b"--" {
                if parsed.destination.is_none() {
                    parsed.destination = args.get(index + 1).map(|a| lossy(a));
                }
                break;
            }

            if let Some(cluster) = arg.strip_prefix(b"-").filter(|c| !c.is_empty()) {
                let next = args.get(index + 1).map(OsString::as_os_str);
                index += parsed.take_cluster(cluster, next);
                continue;
            }

            // ssh keeps reading options after the destination; the next bare
            // word starts the remote command.
            if parsed.destination.is_some() {
                break;
            }
            parsed.destination = Some(lossy(&args[index]));
            index += 1;
        }

        tracing::trace!(
            destination = ?parsed.destination,
            identity_file = ?parsed.identity_file,
            "parsed ssh command line"
        );
        parsed.args = args;
        parsed
    }

    /// Consume one flag cluster such as `-vAi` or `-p22`. Returns how many
    /// arguments were used (2 when a value flag took the following argument).
    ///
    /// Flags are ASCII, so the cluster is scanned byte by byte; any other
    /// byte is an unknown switch.
    fn take_cluster(&mut self, cluster: &[u8], next: Option<&OsStr>) -> usize {
        for (position, &byte) in cluster.iter().enumerate() {
            let flag = char::from(byte);
            if !byte.is_ascii() || !VALUE_FLAGS.contains(flag) {
                if !byte.is_ascii() || !SWITCH_FLAGS.contains(flag) {
                    tracing::debug!("ignoring unknown ssh flag byte {:#04x}", byte);
                }
                continue;
            }

            let attached = &cluster[position + 1..];
            let (value, used) = if attached.is_empty() {
                (next, 2)
            } else {
                (Some(OsStr::from_bytes(attached)), 1)
            };
            if let Some(value) = value {
                self.record(flag, value);
            }
            return used;
        }
        1
    }

    fn record(&mut self, flag: char, value: &OsStr) {
        match flag {
            'i' if self.identity_file.is_none() => self.identity_file = Some(PathBuf::from(value)),
            'F' => self.config_file = Some(PathBuf::from(value)),
            'o' => self.options.push(value.to_os_string()),
            _ => {}
        }
    }

    /// The untouched arguments, for forwarding to the real client.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// First `-i` value, which overrides any configured identity file.
    pub fn identity_file(&self) -> Option<&Path> {
        self.identity_file.as_deref()
    }

    /// Last `-F` value.
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Every `-o` value, in order.
    pub fn options(&self) -> &[OsString] {
        &self.options
    }

    /// The raw destination argument (`host`, `user@host` or `ssh://...`).
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Flags that change what `ssh -G` reports and must be repeated there.
    pub fn config_query_args(&self) -> Vec<OsString> {
        let mut query = Vec::new();
        if let Some(config_file) = &self.config_file {
            query.push(OsString::from("-F"));
            query.push(config_file.clone().into_os_string());
        }
        for option in &self.options {
            query.push(OsString::from("-o"));
            query.push(option.clone());
        }
        query
    }
}

fn lossy(arg: &OsStr) -> String {
    arg.to_string_lossy().into_owned()
}
