//! Filesystem locations of one session's artifacts.

use std::fs;
use std::io;
use std::path::PathBuf;

use sg_config::ServerSettings;
use sg_core::SessionId;

#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub session: SessionId,
    pub output_dir: PathBuf,
    pub config_dir: PathBuf,
    pub flag_dir: PathBuf,
}

impl SessionPaths {
    pub fn new(settings: &ServerSettings, session: &SessionId) -> Self {
        Self {
            session: session.clone(),
            output_dir: settings.paths.output_dir.clone(),
            config_dir: settings.paths.config_dir.clone(),
            flag_dir: settings.paths.flag_dir.clone(),
        }
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [&self.output_dir, &self.config_dir, &self.flag_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Transient Name,Value record handed to the generator.
    pub fn record(&self) -> PathBuf {
        self.config_dir.join(self.session.record_file_name())
    }

    /// Output base given to the generator; it appends `.lsd`.
    pub fn native_base(&self) -> PathBuf {
        self.config_dir.join(self.session.run_base())
    }

    pub fn native_config(&self) -> PathBuf {
        self.config_dir.join(self.session.native_config_file_name())
    }

    pub fn abort_marker(&self) -> PathBuf {
        self.config_dir.join(self.session.abort_file_name())
    }

    pub fn log(&self) -> PathBuf {
        self.output_dir.join(self.session.log_file_name())
    }

    /// Prefix given to the statistics tool; it appends `_mean.csv` etc.
    pub fn results_base(&self) -> PathBuf {
        self.output_dir.join(self.session.run_base())
    }

    pub fn grand_total(&self, seed: i64) -> PathBuf {
        self.output_dir.join(self.session.grand_total_file_name(seed))
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}
