//! Session-scoped operations other than running: configuration intake,
//! abort requests, log and progress polling, saved configurations and
//! session reset.

use std::fs;
use std::path::{Path, PathBuf};

use sg_config::{read_record, sanitize, write_record_file, Catalog, CleanConfig, ServerSettings};
use sg_core::SessionId;

use crate::error::{AppError, AppResult};
use crate::markers;
use crate::paths::SessionPaths;
use crate::progress::read_log_percentage;

/// Largest accepted configuration upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024;

/// Fresh client token for a new session.
pub fn new_session_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn load_settings(path: Option<&Path>) -> AppResult<ServerSettings> {
    match path {
        Some(path) => sg_config::load_settings(path).map_err(|e| AppError::Settings(e.to_string())),
        None => Ok(ServerSettings::default()),
    }
}

pub fn load_catalog(settings: &ServerSettings) -> AppResult<Catalog> {
    Ok(Catalog::load(&settings.tools.parameter_catalog)?)
}

/// Sanitize a submitted configuration against the catalog.
pub fn submit_configuration<I, K, V>(raw: I, catalog: &Catalog) -> CleanConfig
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    sanitize(raw, catalog)
}

/// Ask the session's running simulation to stop.
///
/// Writes the abort marker only while the session holds an occupancy flag;
/// returns whether a run was signalled. Repeating the request is harmless.
pub fn request_abort(settings: &ServerSettings, session: &SessionId) -> AppResult<bool> {
    let paths = SessionPaths::new(settings, session);
    if markers::session_flags(&paths.flag_dir, session)?.is_empty() {
        return Ok(false);
    }
    fs::create_dir_all(&paths.config_dir)?;
    markers::touch(&paths.abort_marker())?;
    tracing::info!(session = %session, "abort requested");
    Ok(true)
}

/// Whether the session currently holds an occupancy flag.
pub fn is_running(settings: &ServerSettings, session: &SessionId) -> AppResult<bool> {
    Ok(!markers::session_flags(&settings.paths.flag_dir, session)?.is_empty())
}

/// Engine log lines of the session's last run; empty when there is none.
pub fn fetch_log(settings: &ServerSettings, session: &SessionId) -> AppResult<Vec<String>> {
    let path = SessionPaths::new(settings, session).log();
    match fs::read(&path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Completion percentage of the session's current run, from its log.
pub fn poll_progress(settings: &ServerSettings, session: &SessionId) -> AppResult<u32> {
    Ok(read_log_percentage(&SessionPaths::new(settings, session).log())?)
}

/// Store the configuration as `config-<id>-<HHMMDDMMYY>.csv` for download,
/// replacing any earlier saved configuration of the session.
pub fn save_configuration(
    settings: &ServerSettings,
    session: &SessionId,
    config: &CleanConfig,
) -> AppResult<PathBuf> {
    if config.is_empty() {
        return Err(AppError::NoConfiguration);
    }

    let paths = SessionPaths::new(settings, session);
    fs::create_dir_all(&paths.output_dir)?;
    let prefix = session.saved_config_prefix();
    for old in markers::matching_files(&paths.output_dir, |name| name.starts_with(&prefix))? {
        markers::remove_if_exists(&old)?;
    }

    let stamp = chrono::Local::now().format("%H%M%d%m%y");
    let path = paths.output_file(&format!("{prefix}{stamp}.csv"));
    write_record_file(&path, config).map_err(|e| AppError::WriteFailure {
        path: path.clone(),
        source: std::io::Error::other(e.to_string()),
    })?;
    Ok(path)
}

/// Validate an uploaded `Name,Value` file and sanitize its content.
pub fn upload_configuration(
    file_name: &str,
    content: &[u8],
    catalog: &Catalog,
) -> AppResult<CleanConfig> {
    let is_csv = Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext == "csv");
    if !is_csv {
        return Err(AppError::InvalidUpload("Invalid file format".to_string()));
    }
    if content.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::InvalidUpload(
            "File size is larger than the allowed 10kB limit".to_string(),
        ));
    }

    let raw = read_record(content).map_err(|e| {
        tracing::debug!(file = file_name, error = %e, "rejected configuration upload");
        AppError::InvalidUpload("Invalid CSV file content".to_string())
    })?;
    Ok(sanitize(&raw, catalog))
}

/// Abort any running simulation of the session and delete its files.
///
/// Occupancy flags and the abort marker stay: the supervisor removes them
/// when the aborted run ends. Returns the number of files deleted.
pub fn reset_session(settings: &ServerSettings, session: &SessionId) -> AppResult<usize> {
    request_abort(settings, session)?;

    let paths = SessionPaths::new(settings, session);
    let mut dirs = vec![paths.output_dir.clone()];
    if paths.config_dir != paths.output_dir {
        dirs.push(paths.config_dir.clone());
    }

    let mut removed = 0;
    for dir in dirs {
        let owned = markers::matching_files(&dir, |name| {
            session.owns_artifact(name) && !name.ends_with(".flag") && !name.ends_with(".abort")
        })?;
        for path in owned {
            if markers::remove_if_exists(&path)? {
                removed += 1;
            }
        }
    }

    tracing::info!(session = %session, removed, "session reset");
    Ok(removed)
}
