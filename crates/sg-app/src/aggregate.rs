//! Monte Carlo aggregation through the external statistics tool.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{AppError, AppResult};
use crate::process_tree::exit_code;

/// Run `mc_stats -o <base> -f <runs...>`, which writes `<base>_mean.csv`,
/// `_se.csv`, `_min.csv` and `_max.csv`.
pub fn aggregate(mc_stats: &Path, base: &Path, runs: &[PathBuf]) -> AppResult<()> {
    if !mc_stats.exists() {
        return Err(AppError::AggregatorUnavailable {
            path: mc_stats.to_path_buf(),
        });
    }

    tracing::info!(base = %base.display(), runs = runs.len(), "aggregating run results");
    let status = Command::new(mc_stats)
        .arg("-o")
        .arg(base)
        .arg("-f")
        .args(runs)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            tracing::error!(tool = %mc_stats.display(), error = %e, "cannot execute statistics tool");
            AppError::AggregatorUnavailable {
                path: mc_stats.to_path_buf(),
            }
        })?;

    if !status.success() {
        let code = exit_code(status);
        tracing::warn!(code, "statistics tool failed");
        return Err(AppError::AggregatorError { code });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = aggregate(&dir.path().join("lsd_mcstats"), &dir.path().join("run-abc123"), &[])
            .unwrap_err();
        assert!(matches!(err, AppError::AggregatorUnavailable { .. }));
    }
}
