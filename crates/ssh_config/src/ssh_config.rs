//! Effective ssh configuration lookup.
//!
//! The real client is the only authority on what a host's configuration
//! means (includes, `Match` blocks, tokens, defaults), so keyssh asks it
//! through `ssh -G` instead of reading `~/.ssh/config` itself. Records are
//! cached for the lifetime of the process.

mod host;
mod record;
mod source;

pub use host::HostTarget;
pub use record::ConfigRecord;
pub use source::{ConfigSource, QueryError, SshConfigSource};

#[cfg(test)]
use source::MockConfigSource;

use rustc_hash::FxHashMap;

/// Caching front of a [`ConfigSource`].
pub struct ConfigResolver<S> {
    source: S,
    cache: FxHashMap<String, Option<ConfigRecord>>,
}

impl<S: ConfigSource> ConfigResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: FxHashMap::default(),
        }
    }

    /// Effective configuration for `target`, or `None` if the query failed.
    ///
    /// Failures are cached as well: the source is consulted at most once per
    /// host, however often this is called.
    pub fn resolve(&mut self, target: &HostTarget) -> Option<&ConfigRecord> {
        let source = &self.source;
        self.cache
            .entry(target.cache_key())
            .or_insert_with(|| match source.query(target.host()) {
                Ok(output) => {
                    let record = ConfigRecord::parse(&output);
                    tracing::debug!(
                        "resolved {} directives for {}",
                        record.len(),
                        target.host()
                    );
                    Some(record)
                }
                Err(e) => {
                    tracing::warn!("could not resolve ssh config for {}: {}", target.host(), e);
                    None
                }
            })
            .as_ref()
    }
}
