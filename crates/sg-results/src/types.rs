//! Result data types.

use serde::{Deserialize, Serialize};

/// Record of the last completed run of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub session: String,
    pub config_digest: String,
    /// RFC 3339 completion time.
    pub timestamp: String,
    pub runs: i64,
    pub seed: i64,
    pub time_steps: i64,
    /// Wall-clock duration of the engine process.
    pub elapsed_secs: f64,
    /// File names (not paths) in the output directory.
    pub result_files: Vec<String>,
}

/// Result file listing handed back to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub files: Vec<String>,
    /// `"<kB> kB"`, `"<kB> kB  [<n> file(s)]"` or `"-"`.
    pub size: String,
    pub runs: usize,
}
