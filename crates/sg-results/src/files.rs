//! Discovery of a session's result files in the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use sg_core::SessionId;

use crate::ResultsResult;

/// Result files of one session, classified by suffix.
///
/// - `run-<id>_<n>.csv`: one file per executed run
/// - `run-<id>_mean.csv`, `_se.csv`, `_min.csv`, `_max.csv`: aggregates
/// - `run-<id>_<a>_<b>.csv`: grand totals, reported but never loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFiles {
    pub runs: Vec<PathBuf>,
    pub mean: Option<PathBuf>,
    pub se: Option<PathBuf>,
    pub min: Option<PathBuf>,
    pub max: Option<PathBuf>,
    pub grand_totals: Vec<PathBuf>,
}

impl ResultFiles {
    pub fn discover(output_dir: &Path, session: &SessionId) -> ResultsResult<Self> {
        let mut files = ResultFiles::default();
        if !output_dir.exists() {
            return Ok(files);
        }

        let prefix = session.result_prefix();
        for entry in fs::read_dir(output_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(suffix) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".csv"))
            else {
                continue;
            };

            match suffix {
                "mean" => files.mean = Some(path),
                "se" => files.se = Some(path),
                "min" => files.min = Some(path),
                "max" => files.max = Some(path),
                _ if is_grand_total(suffix) => files.grand_totals.push(path),
                _ => files.runs.push(path),
            }
        }

        files.runs.sort_by_key(|p| run_index(p));
        files.grand_totals.sort();
        Ok(files)
    }

    pub fn is_empty(&self) -> bool {
        self.all().next().is_none()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn has_aggregates(&self) -> bool {
        self.mean.is_some()
    }

    /// File holding the main series: the mean across runs when aggregates
    /// exist, otherwise the first run.
    pub fn primary(&self) -> Option<&Path> {
        self.mean.as_deref().or_else(|| self.runs.first().map(PathBuf::as_path))
    }

    pub fn all(&self) -> impl Iterator<Item = &Path> {
        self.runs
            .iter()
            .chain(self.mean.iter())
            .chain(self.se.iter())
            .chain(self.min.iter())
            .chain(self.max.iter())
            .chain(self.grand_totals.iter())
            .map(PathBuf::as_path)
    }
}

fn is_grand_total(suffix: &str) -> bool {
    let mut parts = suffix.split('_');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(a), Some(b), None) if is_number(a) && is_number(b)
    )
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Numeric run suffix for ordering; non-numeric suffixes sort last by name.
fn run_index(path: &Path) -> (u64, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let tail = stem.rsplit('_').next().unwrap_or_default();
    (tail.parse().unwrap_or(u64::MAX), stem.to_string())
}

/// Human-readable size of a set of files: `"1.5 kB"` for one file,
/// `"3.0 kB  [2 file(s)]"` for several, `"-"` for none.
pub fn size_summary<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut count = 0usize;
    let mut bytes = 0u64;
    for path in files {
        count += 1;
        bytes += fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    }

    let kb = bytes as f64 / 1024.0;
    match count {
        0 => "-".to_string(),
        1 => format!("{kb:.1} kB"),
        n => format!("{kb:.1} kB  [{n} file(s)]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::parse("abc123").unwrap();
        for name in [
            "run-abc123_10.csv",
            "run-abc123_2.csv",
            "run-abc123_mean.csv",
            "run-abc123_se.csv",
            "run-abc123_1_2.csv",
            "run-zzz999_1.csv",
            "run-abc123.log",
        ] {
            fs::write(dir.path().join(name), "A\n1\n").unwrap();
        }

        let files = ResultFiles::discover(dir.path(), &session).unwrap();
        let runs: Vec<_> = files
            .runs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(runs, ["run-abc123_2.csv", "run-abc123_10.csv"]);
        assert!(files.has_aggregates());
        assert!(files.se.is_some() && files.min.is_none());
        assert_eq!(files.grand_totals.len(), 1);
        assert_eq!(files.all().count(), 5);
        assert!(files.primary().unwrap().ends_with("run-abc123_mean.csv"));
    }

    #[test]
    fn missing_directory_is_empty() {
        let session = SessionId::parse("abc123").unwrap();
        let files = ResultFiles::discover(Path::new("/nonexistent/simgate"), &session).unwrap();
        assert!(files.is_empty());
        assert_eq!(files.primary(), None);
    }

    #[test]
    fn summary_formats() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, vec![b'x'; 1536]).unwrap();
        fs::write(&b, vec![b'x'; 1536]).unwrap();

        assert_eq!(size_summary([a.as_path()]), "1.5 kB");
        assert_eq!(size_summary([a.as_path(), b.as_path()]), "3.0 kB  [2 file(s)]");
        assert_eq!(size_summary(std::iter::empty::<&Path>()), "-");
    }
}
