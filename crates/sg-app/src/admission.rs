//! Server-wide cap on simultaneous simulations.
//!
//! Occupancy is the number of `run-*.flag` files in the flag directory,
//! recounted on every attempt. Counting and flag creation happen while
//! holding `admission.lock`, so two callers can never both take the last
//! slot.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use sg_config::ServerSettings;
use sg_core::SessionId;

use crate::error::{AppError, AppResult};
use crate::markers;

pub const LOCK_FILE_NAME: &str = "admission.lock";

const LOCK_RETRY: Duration = Duration::from_millis(10);
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
/// A lock older than this was left behind by a crashed process.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

/// Occupancy flag of an admitted run. Dropping it frees the slot.
#[derive(Debug)]
pub struct OccupancyFlag {
    path: PathBuf,
    released: bool,
}

impl OccupancyFlag {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        markers::remove_if_exists(&self.path).map(|_| ())
    }
}

impl Drop for OccupancyFlag {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = markers::remove_if_exists(&self.path) {
            tracing::warn!(flag = %self.path.display(), error = %e, "failed to remove occupancy flag");
        }
    }
}

struct AdmissionLock {
    path: PathBuf,
}

impl Drop for AdmissionLock {
    fn drop(&mut self) {
        if let Err(e) = markers::remove_if_exists(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to remove admission lock");
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionControl {
    flag_dir: PathBuf,
    /// Where abort markers live; a leftover marker is cleared on admission.
    marker_dir: Option<PathBuf>,
    max_runs: usize,
    lock_timeout: Duration,
}

impl AdmissionControl {
    pub fn new(flag_dir: impl Into<PathBuf>, max_runs: usize) -> Self {
        Self {
            flag_dir: flag_dir.into(),
            marker_dir: None,
            max_runs,
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new(settings.paths.flag_dir.clone(), settings.limits.max_runs)
            .with_marker_dir(settings.paths.config_dir.clone())
    }

    pub fn with_marker_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.marker_dir = Some(dir.into());
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn active_runs(&self) -> io::Result<usize> {
        Ok(markers::list_flags(&self.flag_dir)?.len())
    }

    /// Take a slot for `session`.
    ///
    /// `Busy` when the cap is reached (nothing is touched), `RunInProgress`
    /// when the session already holds a flag. An abort marker left by an
    /// earlier run is removed together with the flag creation, so any marker
    /// seen afterwards targets this run.
    pub fn try_admit(&self, session: &SessionId) -> AppResult<OccupancyFlag> {
        fs::create_dir_all(&self.flag_dir)?;
        let _lock = self.acquire_lock()?;

        if !markers::session_flags(&self.flag_dir, session)?.is_empty() {
            tracing::info!(session = %session, "admission refused: run already in progress");
            return Err(AppError::RunInProgress);
        }

        let active = self.active_runs()?;
        if active >= self.max_runs {
            tracing::info!(session = %session, active, max = self.max_runs, "admission refused: busy");
            return Err(AppError::Busy);
        }

        let stamp = chrono::Local::now().format("%H%M%S").to_string();
        let path = self.flag_dir.join(session.flag_file_name(&stamp));
        if let Some(dir) = &self.marker_dir {
            markers::remove_if_exists(&dir.join(session.abort_file_name()))?;
        }
        markers::touch(&path)?;
        tracing::debug!(session = %session, flag = %path.display(), active = active + 1, "admitted");

        Ok(OccupancyFlag {
            path,
            released: false,
        })
    }

    fn acquire_lock(&self) -> AppResult<AdmissionLock> {
        let path = self.flag_dir.join(LOCK_FILE_NAME);
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(AdmissionLock { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) {
                        tracing::warn!(lock = %path.display(), "breaking stale admission lock");
                        markers::remove_if_exists(&path)?;
                        continue;
                    }
                    if started.elapsed() >= self.lock_timeout {
                        return Err(AppError::Busy);
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn lock_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > LOCK_STALE_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> SessionId {
        SessionId::parse(id).unwrap()
    }

    #[test]
    fn cap_is_enforced_and_freed() {
        let dir = tempfile::tempdir().unwrap();
        let control = AdmissionControl::new(dir.path(), 2);

        let a = control.try_admit(&session("aaa111")).unwrap();
        let _b = control.try_admit(&session("bbb222")).unwrap();
        assert_eq!(control.active_runs().unwrap(), 2);

        assert!(matches!(
            control.try_admit(&session("ccc333")),
            Err(AppError::Busy)
        ));
        assert_eq!(control.active_runs().unwrap(), 2);

        a.release().unwrap();
        assert!(control.try_admit(&session("ccc333")).is_ok());
    }

    #[test]
    fn flags_from_other_processes_count() {
        let dir = tempfile::tempdir().unwrap();
        markers::touch(&dir.path().join("run-xyz789-235959.flag")).unwrap();
        let control = AdmissionControl::new(dir.path(), 1);

        assert!(matches!(
            control.try_admit(&session("aaa111")),
            Err(AppError::Busy)
        ));
    }

    #[test]
    fn one_run_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let control = AdmissionControl::new(dir.path(), 5);

        let flag = control.try_admit(&session("aaa111")).unwrap();
        assert!(flag.path().exists());
        assert!(matches!(
            control.try_admit(&session("aaa111")),
            Err(AppError::RunInProgress)
        ));

        let path = flag.path().to_path_buf();
        drop(flag);
        assert!(!path.exists());
    }

    #[test]
    fn admission_clears_a_leftover_abort_marker() {
        let dir = tempfile::tempdir().unwrap();
        let markers_dir = dir.path().join("conf");
        fs::create_dir_all(&markers_dir).unwrap();
        let stale = markers_dir.join("run-aaa111.abort");
        let other = markers_dir.join("run-bbb222.abort");
        markers::touch(&stale).unwrap();
        markers::touch(&other).unwrap();

        let control =
            AdmissionControl::new(dir.path().join("flags"), 5).with_marker_dir(&markers_dir);
        let _flag = control.try_admit(&session("aaa111")).unwrap();
        assert!(!stale.exists());
        assert!(other.exists());
    }

    #[test]
    fn held_lock_times_out_busy() {
        let dir = tempfile::tempdir().unwrap();
        markers::touch(&dir.path().join(LOCK_FILE_NAME)).unwrap();
        let control =
            AdmissionControl::new(dir.path(), 5).with_lock_timeout(Duration::from_millis(50));

        assert!(matches!(
            control.try_admit(&session("aaa111")),
            Err(AppError::Busy)
        ));
        assert_eq!(control.active_runs().unwrap(), 0);
    }
}
