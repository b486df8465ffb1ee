use core::fmt;

use crate::{CoreError, CoreResult};

/// Number of characters kept from the client token.
pub const SESSION_ID_LEN: usize = 6;

/// Token used when the client did not present one.
pub const ANONYMOUS_TOKEN: &str = "NOCOOKIE";

/// Short identifier namespacing every filesystem artifact of one client
/// session.
///
/// - derived from the last [`SESSION_ID_LEN`] ASCII alphanumerics of the
///   client-held token
/// - always non-empty and alphanumeric, so it is safe inside file names
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Derive the short id from a client token.
    pub fn from_token(token: Option<&str>) -> Self {
        let clean: Vec<char> = token
            .unwrap_or(ANONYMOUS_TOKEN)
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let clean = if clean.is_empty() {
            ANONYMOUS_TOKEN.chars().collect()
        } else {
            clean
        };
        let start = clean.len().saturating_sub(SESSION_ID_LEN);
        Self(clean[start..].iter().collect())
    }

    /// Accept an already-short id, e.g. one read back from a file name.
    pub fn parse(id: &str) -> CoreResult<Self> {
        let valid = !id.is_empty()
            && id.len() <= SESSION_ID_LEN
            && id.chars().all(|c| c.is_ascii_alphanumeric());
        if valid {
            Ok(Self(id.to_string()))
        } else {
            Err(CoreError::InvalidSessionId { id: id.to_string() })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `run-<id>`: base name shared by every run artifact.
    pub fn run_base(&self) -> String {
        format!("run-{}", self.0)
    }

    /// `run-<id>.csv`: transient Name,Value record.
    pub fn record_file_name(&self) -> String {
        format!("run-{}.csv", self.0)
    }

    /// `run-<id>.lsd`: materialized engine configuration.
    pub fn native_config_file_name(&self) -> String {
        format!("run-{}.lsd", self.0)
    }

    /// `run-<id>.abort`: cancellation request marker.
    pub fn abort_file_name(&self) -> String {
        format!("run-{}.abort", self.0)
    }

    /// `run-<id>.log`: engine stdout and stderr.
    pub fn log_file_name(&self) -> String {
        format!("run-{}.log", self.0)
    }

    /// `run-<id>.json`: manifest of the last completed run.
    pub fn manifest_file_name(&self) -> String {
        format!("run-{}.json", self.0)
    }

    /// `run-<id>-<stamp>.flag`: occupancy marker.
    pub fn flag_file_name(&self, stamp: &str) -> String {
        format!("run-{}-{}.flag", self.0, stamp)
    }

    /// Whether `name` is an occupancy marker of this session.
    pub fn owns_flag(&self, name: &str) -> bool {
        is_flag_file_name(name) && name.starts_with(&format!("run-{}-", self.0))
    }

    /// `run-<id>_`: prefix of every result file of this session.
    pub fn result_prefix(&self) -> String {
        format!("run-{}_", self.0)
    }

    /// `run-<id>_<seed>_<seed>.csv`: grand-total file of a single run.
    pub fn grand_total_file_name(&self, seed: i64) -> String {
        format!("run-{}_{}_{}.csv", self.0, seed, seed)
    }

    /// `config-<id>-`: prefix of saved (downloadable) configurations.
    pub fn saved_config_prefix(&self) -> String {
        format!("config-{}-", self.0)
    }

    /// Whether `name` is one of this session's temporary artifacts, i.e.
    /// matches `*-<id>*.*` with the id ending at `.`, `_` or `-`.
    ///
    /// The delimiter keeps a short id from claiming files of a longer one
    /// (`x1` vs `run-x1abcd.log`) and a numeric id from matching a
    /// timestamp (`101518` vs `config-zzz999-1015180326.csv`).
    pub fn owns_artifact(&self, name: &str) -> bool {
        let needle = format!("-{}", self.0);
        name.match_indices(&needle).any(|(pos, _)| {
            let rest = &name[pos + needle.len()..];
            rest.starts_with(['.', '_', '-']) && rest.contains('.')
        })
    }
}

/// Whether `name` is an occupancy marker of any session (`run-*.flag`).
pub fn is_flag_file_name(name: &str) -> bool {
    name.starts_with("run-") && name.ends_with(".flag")
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_keeps_last_alphanumerics() {
        let id = SessionId::from_token(Some("8f2k-19ab_cd7e"));
        assert_eq!(id.as_str(), "abcd7e");
    }

    #[test]
    fn short_and_missing_tokens() {
        assert_eq!(SessionId::from_token(Some("x1")).as_str(), "x1");
        assert_eq!(SessionId::from_token(None).as_str(), "COOKIE");
        assert_eq!(SessionId::from_token(Some("../--")).as_str(), "COOKIE");
    }

    #[test]
    fn parse_rejects_path_characters() {
        assert!(SessionId::parse("abc123").is_ok());
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("ab/c").is_err());
        assert!(SessionId::parse("abcdefg").is_err());
    }

    #[test]
    fn artifact_names() {
        let id = SessionId::parse("abc123").unwrap();
        assert_eq!(id.record_file_name(), "run-abc123.csv");
        assert_eq!(id.flag_file_name("101500"), "run-abc123-101500.flag");
        assert_eq!(id.grand_total_file_name(7), "run-abc123_7_7.csv");
        assert!(id.owns_flag("run-abc123-101500.flag"));
        assert!(!id.owns_flag("run-zzz999-101500.flag"));
        assert!(is_flag_file_name("run-zzz999-101500.flag"));
    }

    #[test]
    fn owned_artifacts_follow_dash_pattern() {
        let id = SessionId::parse("abc123").unwrap();
        assert!(id.owns_artifact("run-abc123.log"));
        assert!(id.owns_artifact("run-abc123_mean.csv"));
        assert!(id.owns_artifact("config-abc123-1015180326.csv"));
        assert!(!id.owns_artifact("run-abc124.log"));
        assert!(!id.owns_artifact("lwi-abc123"));
    }

    #[test]
    fn owned_artifacts_need_a_delimiter_after_the_id() {
        let short = SessionId::parse("x1").unwrap();
        assert!(short.owns_artifact("run-x1.log"));
        assert!(!short.owns_artifact("run-x1abcd.log"));

        let numeric = SessionId::parse("101518").unwrap();
        assert!(numeric.owns_artifact("config-101518-1015180326.csv"));
        assert!(!numeric.owns_artifact("config-zzz999-1015180326.csv"));
    }
}
