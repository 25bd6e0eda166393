//! Destination normalization.

/// The host part of an ssh destination, used as the config lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostTarget {
    host: String,
}

impl HostTarget {
    /// Normalize a raw destination argument.
    ///
    /// Accepts `host`, `user@host` and `ssh://[user@]host[:port]`. Returns
    /// `None` when nothing is left after stripping.
    pub fn from_destination(destination: &str) -> Option<Self> {
        let (rest, is_uri) = match destination.strip_prefix("ssh://") {
            Some(rest) => (rest.trim_end_matches('/'), true),
            None => (destination, false),
        };

        let host = match rest.rsplit_once('@') {
            Some((_, host)) => host,
            None => rest,
        };

        let host = if is_uri { strip_port(host) } else { host };
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
        })
    }

    /// The host as given, minus user and port.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Lower-cased host; one config record is cached per key.
    pub fn cache_key(&self) -> String {
        self.host.to_lowercase()
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(bracketed) = host.strip_prefix('[') {
        return bracketed.split(']').next().unwrap_or_default();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
