//! Filesystem booleans: occupancy flags and abort markers.
//!
//! Creating an existing marker and removing a missing one both succeed.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use sg_core::{is_flag_file_name, SessionId};

pub fn touch(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
}

/// Remove `path`; returns whether a file was actually removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn file_names(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.push((name.to_string(), entry.path()));
        }
    }
    Ok(names)
}

/// Every `run-*.flag` in `flag_dir`.
pub fn list_flags(flag_dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(file_names(flag_dir)?
        .into_iter()
        .filter(|(name, _)| is_flag_file_name(name))
        .map(|(_, path)| path)
        .collect())
}

/// Flags held by `session`.
pub fn session_flags(flag_dir: &Path, session: &SessionId) -> io::Result<Vec<PathBuf>> {
    Ok(file_names(flag_dir)?
        .into_iter()
        .filter(|(name, _)| session.owns_flag(name))
        .map(|(_, path)| path)
        .collect())
}

/// Files in `dir` whose name satisfies `keep`.
pub fn matching_files(dir: &Path, keep: impl Fn(&str) -> bool) -> io::Result<Vec<PathBuf>> {
    Ok(file_names(dir)?
        .into_iter()
        .filter(|(name, path)| keep(name) && path.is_file())
        .map(|(_, path)| path)
        .collect())
}
