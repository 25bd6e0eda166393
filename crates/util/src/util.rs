//! Shared utilities for keyssh.

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Expand a leading `~` or `~/` against the user's home directory.
pub fn expand_home(input: impl AsRef<Path>) -> PathBuf {
    expand_home_with(input, keyssh_paths::home_dir())
}

/// Expand a leading `~` or `~/` against `home`.
///
/// Works on path components, so non-UTF-8 paths survive. `~user` forms are
/// returned unchanged; ssh itself expands those before they ever reach us
/// through `ssh -G`.
pub fn expand_home_with(input: impl AsRef<Path>, home: &Path) -> PathBuf {
    let input = input.as_ref();
    match input.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => input.to_path_buf(),
    }
}

/// Log-and-discard helper for best-effort operations.
pub trait ResultExt<T> {
    /// Log the error at `warn` level and return `None`.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: Display> ResultExt<T> for Result<T, E> {
    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                tracing::warn!("{}:{}: {}", caller.file(), caller.line(), error);
                None
            }
        }
    }
}
