//! sg-results: result file discovery, series loading, descriptive
//! statistics, table/plot views and the run manifest.

pub mod files;
pub mod hash;
pub mod load;
pub mod stats;
pub mod store;
pub mod types;
pub mod views;

pub use files::{size_summary, ResultFiles};
pub use hash::config_digest;
pub use load::{load, LoadOptions, Series, SeriesSet};
pub use stats::{confidence_band, describe, t95, SeriesStats, StepRange};
pub use store::ManifestStore;
pub use types::*;
pub use views::{plot_view, select_series, statistics_view, table_view, PlotOptions, PlotView, TableRow, TableView};

/// Most series a table or plot may show at once.
pub const MAX_SELECTED_SERIES: usize = 15;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No simulation results available")]
    NoResults,

    #[error("Invalid results file '{file}'{}", location(.line, .column))]
    InvalidResultsFile {
        file: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("Inconsistent results: {reason}")]
    InconsistentResults { reason: String },

    #[error("No time series selected")]
    NoSeriesSelected,

    #[error("Too many time series selected ({count}, at most {MAX_SELECTED_SERIES})")]
    TooManySeriesSelected { count: usize },

    #[error("No run manifest for session {session}")]
    RunNotFound { session: String },
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" on line {line}, column {column}"),
        (Some(line), None) => format!(" on line {line}"),
        _ => String::new(),
    }
}
