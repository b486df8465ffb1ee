//! Shared application service layer for simgate.
//!
//! Front ends call into this crate for everything a session does: submit
//! and persist configurations, run the simulation engine under supervision,
//! abort it, poll its progress and query its results.

pub mod admission;
pub mod aggregate;
pub mod error;
pub mod markers;
pub mod materialize;
pub mod paths;
pub mod process_tree;
pub mod progress;
pub mod query;
pub mod run_service;
pub mod session_service;

// Re-export key types for convenience
pub use admission::{AdmissionControl, OccupancyFlag};
pub use error::{AppError, AppResult};
pub use paths::SessionPaths;
pub use process_tree::terminate_process_tree;
pub use progress::{RunProgressEvent, RunStage};
pub use query::{
    fetch_plot_data, fetch_results, fetch_statistics, fetch_table, last_run, list_series,
    load_series, ViewRequest,
};
pub use run_service::{
    start_run, start_run_with_progress, CancelToken, RunRecord, RunRequest, RunResponse, RunState,
};
pub use session_service::{
    fetch_log, is_running, load_catalog, load_settings, new_session_token, poll_progress,
    request_abort, reset_session, save_configuration, submit_configuration, upload_configuration,
};
