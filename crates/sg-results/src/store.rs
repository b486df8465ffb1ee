//! Run manifest storage next to the result files.

use std::fs;
use std::path::{Path, PathBuf};

use sg_core::SessionId;

use crate::types::RunManifest;
use crate::{ResultsError, ResultsResult};

#[derive(Clone)]
pub struct ManifestStore {
    root_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn manifest_path(&self, session: &SessionId) -> PathBuf {
        self.root_dir.join(session.manifest_file_name())
    }

    pub fn has_manifest(&self, session: &SessionId) -> bool {
        self.manifest_path(session).exists()
    }

    pub fn save(&self, manifest: &RunManifest) -> ResultsResult<()> {
        let session = SessionId::parse(&manifest.session).map_err(|_| ResultsError::RunNotFound {
            session: manifest.session.clone(),
        })?;
        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(self.manifest_path(&session), manifest_json)?;
        Ok(())
    }

    pub fn load(&self, session: &SessionId) -> ResultsResult<RunManifest> {
        let manifest_path = self.manifest_path(session);

        if !manifest_path.exists() {
            return Err(ResultsError::RunNotFound {
                session: session.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    pub fn delete(&self, session: &SessionId) -> ResultsResult<()> {
        let path = self.manifest_path(session);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
