//! Conversion of a clean configuration into the engine's native format.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use sg_config::{write_record_file, CleanConfig, ServerSettings};

use crate::error::{AppError, AppResult};
use crate::markers;
use crate::paths::SessionPaths;
use crate::process_tree::exit_code;

/// Produce the configuration file the engine will read.
///
/// The clean configuration is written as a `Name,Value` record. When the
/// engine reads records directly that file is the result; otherwise the
/// generator turns it into `<base>.lsd` and the record is deleted whatever
/// the generator's outcome.
pub fn materialize(
    clean: &CleanConfig,
    settings: &ServerSettings,
    paths: &SessionPaths,
) -> AppResult<PathBuf> {
    let record = paths.record();
    let write = |path: &PathBuf| {
        write_record_file(path, clean).map_err(|e| AppError::WriteFailure {
            path: path.clone(),
            source: match e {
                sg_config::ConfigError::Io(io) => io,
                other => std::io::Error::other(other.to_string()),
            },
        })
    };

    if settings.reads_record_config {
        write(&record)?;
        return Ok(record);
    }

    let generator = &settings.tools.config_generator;
    let model = &settings.tools.model_definition;
    for path in [generator, model] {
        if !path.exists() {
            return Err(AppError::GeneratorUnavailable { path: path.clone() });
        }
    }

    write(&record)?;
    let base = paths.native_base();
    let status = Command::new(generator)
        .arg("-f")
        .arg(model)
        .arg("-c")
        .arg(&record)
        .arg("-o")
        .arg(&base)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    if let Err(e) = markers::remove_if_exists(&record) {
        tracing::warn!(record = %record.display(), error = %e, "failed to remove configuration record");
    }

    let status = status.map_err(|e| {
        tracing::error!(generator = %generator.display(), error = %e, "cannot execute configuration generator");
        AppError::GeneratorUnavailable {
            path: generator.clone(),
        }
    })?;
    if !status.success() {
        let code = exit_code(status);
        tracing::warn!(session = %paths.session, code, "configuration generator failed");
        return Err(AppError::GeneratorError { code });
    }

    Ok(paths.native_config())
}
