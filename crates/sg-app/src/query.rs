//! Read-only views over a session's results.

use serde::Serialize;
use sg_config::ServerSettings;
use sg_core::SessionId;
use sg_results::{
    plot_view, size_summary, statistics_view, table_view, LoadOptions, ManifestStore,
    PlotOptions, PlotView, ResultFiles, ResultSummary, RunManifest, SeriesSet, SeriesStats,
    StepRange, TableView,
};

use crate::error::{AppError, AppResult};

/// Which series and steps a view covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewRequest {
    pub series: Vec<String>,
    /// First step, 1-based; `None` starts at the first.
    pub begin: Option<i64>,
    /// Last step, inclusive; `None` runs to the last.
    pub end: Option<i64>,
    /// Natural log of the values.
    pub log: bool,
}

fn discover(settings: &ServerSettings, session: &SessionId) -> AppResult<ResultFiles> {
    let files = ResultFiles::discover(&settings.paths.output_dir, session)?;
    if files.is_empty() {
        return Err(AppError::NoResults);
    }
    Ok(files)
}

/// Result files of the session's last run with their total size.
pub fn fetch_results(settings: &ServerSettings, session: &SessionId) -> AppResult<ResultSummary> {
    let files = discover(settings, session)?;
    Ok(ResultSummary {
        files: files
            .all()
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect(),
        size: size_summary(files.all()),
        runs: files.run_count(),
    })
}

/// Manifest of the session's last completed run, if one was recorded.
pub fn last_run(settings: &ServerSettings, session: &SessionId) -> AppResult<Option<RunManifest>> {
    let store = ManifestStore::new(settings.paths.output_dir.clone())?;
    if !store.has_manifest(session) {
        return Ok(None);
    }
    Ok(Some(store.load(session)?))
}

pub fn load_series(
    settings: &ServerSettings,
    session: &SessionId,
    log: bool,
) -> AppResult<SeriesSet> {
    let files = discover(settings, session)?;
    let options = LoadOptions {
        log,
        missing_marker: settings.missing_marker.clone(),
    };
    Ok(sg_results::load(&files, &options)?)
}

/// Names of the output variables available for selection.
pub fn list_series(settings: &ServerSettings, session: &SessionId) -> AppResult<Vec<String>> {
    let set = load_series(settings, session, false)?;
    Ok(set.names().map(str::to_string).collect())
}

fn loaded(
    settings: &ServerSettings,
    session: &SessionId,
    request: &ViewRequest,
) -> AppResult<(SeriesSet, StepRange)> {
    let set = load_series(settings, session, request.log)?;
    let range = StepRange::resolve(request.begin, request.end, set.steps);
    Ok((set, range))
}

pub fn fetch_statistics(
    settings: &ServerSettings,
    session: &SessionId,
    request: &ViewRequest,
) -> AppResult<Vec<SeriesStats>> {
    let (set, range) = loaded(settings, session, request)?;
    Ok(statistics_view(&set, &request.series, range)?)
}

pub fn fetch_table(
    settings: &ServerSettings,
    session: &SessionId,
    request: &ViewRequest,
) -> AppResult<TableView> {
    let (set, range) = loaded(settings, session, request)?;
    Ok(table_view(&set, &request.series, range)?)
}

pub fn fetch_plot_data(
    settings: &ServerSettings,
    session: &SessionId,
    request: &ViewRequest,
    options: &PlotOptions,
) -> AppResult<PlotView> {
    let (set, range) = loaded(settings, session, request)?;
    Ok(plot_view(&set, &request.series, range, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn settings(root: &std::path::Path) -> ServerSettings {
        let mut settings = ServerSettings::default();
        settings.paths.output_dir = root.to_path_buf();
        settings
    }

    #[test]
    fn no_results_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionId::parse("abc123").unwrap();
        assert!(matches!(
            fetch_results(&settings(dir.path()), &session),
            Err(AppError::NoResults)
        ));
        assert!(last_run(&settings(dir.path()), &session).unwrap().is_none());
    }

    #[test]
    fn single_run_views() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let session = SessionId::parse("abc123").unwrap();
        fs::write(dir.path().join("run-abc123_1.csv"), "A,B\n1,NA\n2,3\n").unwrap();

        let summary = fetch_results(&settings, &session).unwrap();
        assert_eq!(summary.files, vec!["run-abc123_1.csv".to_string()]);
        assert_eq!(summary.runs, 1);
        assert!(summary.size.ends_with(" kB"));

        assert_eq!(list_series(&settings, &session).unwrap(), vec!["A", "B"]);

        let stats = fetch_statistics(&settings, &session, &ViewRequest::default()).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].mean, Some(1.5));
        assert_eq!(stats[1].obs, 1);

        let request = ViewRequest {
            series: vec!["B".to_string()],
            ..ViewRequest::default()
        };
        let table = fetch_table(&settings, &session, &request).unwrap();
        assert_eq!(table.rows[0].values, vec!["N/A".to_string()]);
        assert_eq!(table.rows[1].values, vec!["3".to_string()]);

        assert!(matches!(
            fetch_plot_data(&settings, &session, &ViewRequest::default(), &PlotOptions::default()),
            Err(AppError::NoSeriesSelected)
        ));
    }
}
