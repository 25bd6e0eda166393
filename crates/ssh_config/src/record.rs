//! Parsed `ssh -G` output.

use indexmap::IndexMap;

/// Effective configuration for one host, keyed by lower-cased directive.
///
/// Directives that appear several times (`identityfile`, `localforward`, ...)
/// keep every value in output order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigRecord {
    directives: IndexMap<String, Vec<String>>,
}

impl ConfigRecord {
    /// Parse `directive value...` lines. The value is the rest of the line,
    /// so multi-word values survive intact. Lines with fewer than two tokens
    /// are skipped.
    pub fn parse(output: &str) -> Self {
        let mut directives: IndexMap<String, Vec<String>> = IndexMap::new();
        for line in output.lines() {
            let line = line.trim();
            let Some((name, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            directives
                .entry(name.to_lowercase())
                .or_default()
                .push(value.to_string());
        }
        Self { directives }
    }

    /// First value of a directive. ssh uses the first obtained value too.
    pub fn get(&self, directive: &str) -> Option<&str> {
        self.values(directive).first().map(String::as_str)
    }

    /// All values of a directive.
    pub fn values(&self, directive: &str) -> &[String] {
        self.directives
            .get(directive.to_lowercase().as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The identity file authentication will try first.
    ///
    /// `None` when the host has no `IdentityFile` of its own, in which case
    /// `ssh -G` lists OpenSSH's built-in defaults instead.
    pub fn identity_file(&self) -> Option<&str> {
        if is_default_identity_list(self.values("identityfile")) {
            return None;
        }
        self.get("identityfile").filter(|v| !is_none(v))
    }

    /// Command to run locally before connecting. Only reported when
    /// `PermitLocalCommand` is on; ssh prints `localcommand` either way.
    pub fn local_command(&self) -> Option<&str> {
        let permitted = self
            .get("permitlocalcommand")
            .is_some_and(|v| v.eq_ignore_ascii_case("yes"));
        if !permitted {
            return None;
        }
        self.get("localcommand").filter(|v| !is_none(v))
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

fn is_none(value: &str) -> bool {
    value.eq_ignore_ascii_case("none")
}

/// True when `values` is OpenSSH's default identity list, in any order and
/// with or without the entries some releases drop.
fn is_default_identity_list(values: &[String]) -> bool {
    use settings::constants::openssh::{DEFAULT_IDENTITY_FILES, OPTIONAL_DEFAULT_IDENTITY_FILES};

    if values.is_empty() {
        return false;
    }
    let all_defaults = values
        .iter()
        .all(|v| DEFAULT_IDENTITY_FILES.contains(&v.as_str()));
    let all_required = DEFAULT_IDENTITY_FILES
        .iter()
        .filter(|d| !OPTIONAL_DEFAULT_IDENTITY_FILES.contains(*d))
        .all(|d| values.iter().any(|v| v == d));
    all_defaults && all_required
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
user alice
hostname 10.0.0.5
port 22
identityfile /home/u/.ssh/id_ed25519
identityfile ~/.ssh/id_rsa
localcommand echo hi
permitlocalcommand yes
IdentitiesOnly yes
";

    /// `ssh -G` for a host with no `IdentityFile` and no `PermitLocalCommand`
    /// (OpenSSH 9.2).
    const UNCONFIGURED: &str = "\
user alice
hostname plain.example
port 22
identityfile ~/.ssh/id_rsa
identityfile ~/.ssh/id_ecdsa
identityfile ~/.ssh/id_ecdsa_sk
identityfile ~/.ssh/id_ed25519
identityfile ~/.ssh/id_ed25519_sk
identityfile ~/.ssh/id_xmss
identityfile ~/.ssh/id_dsa
localcommand touch /tmp/marker
permitlocalcommand no
";

    #[test]
    fn exposes_identity_file_and_local_command() {
        let record = ConfigRecord::parse(SAMPLE);
        assert_eq!(record.identity_file(), Some("/home/u/.ssh/id_ed25519"));
        assert_eq!(record.local_command(), Some("echo hi"));
    }

    #[test]
    fn keeps_every_value_of_repeated_directives() {
        let record = ConfigRecord::parse(SAMPLE);
        assert_eq!(
            record.values("identityfile"),
            ["/home/u/.ssh/id_ed25519", "~/.ssh/id_rsa"]
        );
        assert_eq!(record.len(), 7);
    }

    #[test]
    fn lower_cases_directive_names() {
        let record = ConfigRecord::parse(SAMPLE);
        assert_eq!(record.get("identitiesonly"), Some("yes"));
        assert_eq!(record.get("IdentitiesOnly"), Some("yes"));
    }

    #[test]
    fn skips_blank_and_single_token_lines() {
        let record = ConfigRecord::parse("\n   \nforwardagent\nport    2222   \n");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("port"), Some("2222"));
        assert_eq!(record.get("forwardagent"), None);
    }

    #[test]
    fn keeps_inner_whitespace_of_values() {
        let record =
            ConfigRecord::parse("permitlocalcommand yes\nlocalcommand printf '%s  %s' a b\n");
        assert_eq!(record.local_command(), Some("printf '%s  %s' a b"));
    }

    #[test]
    fn none_means_unset() {
        let record = ConfigRecord::parse(
            "identityfile none\nlocalcommand NONE\npermitlocalcommand yes\n",
        );
        assert_eq!(record.identity_file(), None);
        assert_eq!(record.local_command(), None);
    }

    #[test]
    fn default_identity_list_is_not_a_configured_key() {
        let record = ConfigRecord::parse(UNCONFIGURED);
        assert_eq!(record.values("identityfile").len(), 7);
        assert_eq!(record.identity_file(), None);
    }

    #[test]
    fn default_list_of_newer_releases_is_recognized() {
        let trimmed: String = UNCONFIGURED
            .lines()
            .filter(|line| !line.ends_with("id_dsa") && !line.ends_with("id_xmss"))
            .map(|line| format!("{line}\n"))
            .collect();
        assert_eq!(ConfigRecord::parse(&trimmed).identity_file(), None);
    }

    #[test]
    fn single_default_name_is_a_configured_key() {
        let record = ConfigRecord::parse("identityfile ~/.ssh/id_rsa\n");
        assert_eq!(record.identity_file(), Some("~/.ssh/id_rsa"));
    }

    #[test]
    fn configured_key_before_defaults_wins() {
        let record = ConfigRecord::parse(&format!("identityfile ~/.ssh/id_work\n{UNCONFIGURED}"));
        assert_eq!(record.identity_file(), Some("~/.ssh/id_work"));
    }

    #[test]
    fn local_command_needs_permit_local_command() {
        let record = ConfigRecord::parse(UNCONFIGURED);
        assert_eq!(record.get("localcommand"), Some("touch /tmp/marker"));
        assert_eq!(record.local_command(), None);

        let record = ConfigRecord::parse("localcommand echo hi\n");
        assert_eq!(record.local_command(), None);

        let record = ConfigRecord::parse("localcommand echo hi\npermitlocalcommand YES\n");
        assert_eq!(record.local_command(), Some("echo hi"));
    }

    #[test]
    fn empty_output_is_empty_record() {
        let record = ConfigRecord::parse("");
        assert!(record.is_empty());
        assert!(record.values("identityfile").is_empty());
    }
}
