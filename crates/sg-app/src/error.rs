//! Error types for the sg-app service layer.

use std::path::{Path, PathBuf};

/// Application error type covering every outcome a front end has to
/// report, from admission to result views.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Too many simulations running")]
    Busy,

    #[error("A simulation is already running for this session")]
    RunInProgress,

    #[error("Configuration is empty")]
    NoConfiguration,

    #[error("Failed to write {path}")]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration generator or model definition not found: {path}")]
    GeneratorUnavailable { path: PathBuf },

    #[error("Configuration generator exited with code {code}")]
    GeneratorError { code: i32 },

    #[error("Simulation engine or configuration not found: {path}")]
    EngineUnavailable { path: PathBuf },

    #[error("Failed to launch simulation engine")]
    LaunchFailure { source: std::io::Error },

    #[error("Simulation aborted by user")]
    Aborted,

    #[error("Simulation timed out")]
    TimedOut,

    #[error("Simulation engine exited with code {code}")]
    EngineExit { code: i32 },

    #[error("Statistics tool not found: {path}")]
    AggregatorUnavailable { path: PathBuf },

    #[error("Statistics tool exited with code {code}")]
    AggregatorError { code: i32 },

    #[error("No simulation results available")]
    NoResults,

    #[error("Invalid results file: {file}")]
    InvalidResultsFile {
        file: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("Inconsistent results: {0}")]
    InconsistentResults(String),

    #[error("No time series selected")]
    NoSeriesSelected,

    #[error("Too many time series selected: {count}")]
    TooManySeriesSelected { count: usize },

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sg-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Short user-facing status, prefixed `Busy:`, `Aborted:` or `Error:`.
    /// Paths and internal details are not included.
    pub fn status_line(&self) -> String {
        match self {
            AppError::Busy => "Busy: Cannot execute now, please try later".to_string(),
            AppError::RunInProgress => {
                "Busy: A simulation is already running for this session".to_string()
            }
            AppError::Aborted => "Aborted: user interruption".to_string(),
            AppError::TimedOut => "Aborted: execution timed out".to_string(),
            AppError::EngineExit { code } => format!("Aborted: simulation engine error={code}"),
            AppError::AggregatorUnavailable { .. } => {
                "Aborted: statistics tool not reachable".to_string()
            }
            AppError::AggregatorError { code } => format!("Aborted: statistics tool error={code}"),
            AppError::NoConfiguration => "Error: No configuration data to use".to_string(),
            AppError::WriteFailure { .. } => {
                "Error: Cannot write configuration file on server".to_string()
            }
            AppError::GeneratorUnavailable { .. } => {
                "Error: configuration generator or model definition not reachable".to_string()
            }
            AppError::GeneratorError { code } => {
                format!("Error: configuration generator error={code}")
            }
            AppError::EngineUnavailable { .. } => {
                "Error: simulation engine or configuration not reachable".to_string()
            }
            AppError::LaunchFailure { .. } => "Error: cannot run simulation engine".to_string(),
            AppError::NoResults => {
                "Error: No simulation results available, please execute the simulation first"
                    .to_string()
            }
            AppError::InvalidResultsFile { file, line, column } => {
                let name = Path::new(file)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match (line, column) {
                    (Some(l), Some(c)) => {
                        format!("Error: Invalid results file '{name}' on line {l}, column {c}")
                    }
                    (Some(l), None) => format!("Error: Invalid results file '{name}' on line {l}"),
                    _ => format!("Error: Invalid results file '{name}'"),
                }
            }
            AppError::InconsistentResults(_) => "Error: Inconsistent results files".to_string(),
            AppError::NoSeriesSelected => {
                "Error: No time series selected, please select at least one".to_string()
            }
            AppError::TooManySeriesSelected { .. } => format!(
                "Error: Too many time series selected, please select up to {}",
                sg_results::MAX_SELECTED_SERIES
            ),
            AppError::InvalidUpload(reason) => format!("Error: {reason}"),
            AppError::Config(_) | AppError::Settings(_) => {
                "Error: Invalid server configuration".to_string()
            }
            AppError::RunNotFound(_) => "Error: No completed run for this session".to_string(),
            AppError::Results(_) | AppError::Io(_) => "Error: Server file access failed".to_string(),
        }
    }
}

// Conversions from backend error types
impl From<sg_config::ConfigError> for AppError {
    fn from(err: sg_config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sg_core::CoreError> for AppError {
    fn from(err: sg_core::CoreError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sg_results::ResultsError> for AppError {
    fn from(err: sg_results::ResultsError) -> Self {
        use sg_results::ResultsError;
        match err {
            ResultsError::Io(e) => AppError::Io(e),
            ResultsError::NoResults => AppError::NoResults,
            ResultsError::InvalidResultsFile { file, line, column } => {
                AppError::InvalidResultsFile { file, line, column }
            }
            ResultsError::InconsistentResults { reason } => AppError::InconsistentResults(reason),
            ResultsError::NoSeriesSelected => AppError::NoSeriesSelected,
            ResultsError::TooManySeriesSelected { count } => {
                AppError::TooManySeriesSelected { count }
            }
            ResultsError::RunNotFound { session } => AppError::RunNotFound(session),
            other => AppError::Results(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines_carry_category() {
        assert_eq!(
            AppError::Busy.status_line(),
            "Busy: Cannot execute now, please try later"
        );
        assert_eq!(AppError::Aborted.status_line(), "Aborted: user interruption");
        assert_eq!(AppError::TimedOut.status_line(), "Aborted: execution timed out");
        assert!(AppError::EngineExit { code: 3 }.status_line().ends_with("error=3"));
        assert!(AppError::GeneratorError { code: 2 }.status_line().starts_with("Error: "));
    }

    #[test]
    fn status_line_hides_paths() {
        let err = AppError::InvalidResultsFile {
            file: "/srv/simgate/tmp/run-abc123_1.csv".to_string(),
            line: Some(4),
            column: Some(2),
        };
        assert_eq!(
            err.status_line(),
            "Error: Invalid results file 'run-abc123_1.csv' on line 4, column 2"
        );

        let err = AppError::EngineUnavailable {
            path: "/srv/simgate/bin/lsdNW".into(),
        };
        assert!(!err.status_line().contains("/srv"));
    }

    #[test]
    fn results_errors_keep_their_kind() {
        let err: AppError = sg_results::ResultsError::TooManySeriesSelected { count: 16 }.into();
        assert!(matches!(err, AppError::TooManySeriesSelected { count: 16 }));
        let err: AppError = sg_results::ResultsError::NoResults.into();
        assert!(matches!(err, AppError::NoResults));
    }
}
