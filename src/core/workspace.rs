//! Workspace - the loaded project and its paths.
//!
//! A Workspace ties a parsed [`Manifest`] to its project root and the
//! `.assetstage` state directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::manifest::{Manifest, MANIFEST_NAME};
use crate::util::context::STATE_DIR_NAME;
use crate::util::GlobalContext;

/// Error locating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `Stage.toml` in `{}` or any parent directory", .dir.display())]
    NotFound { dir: PathBuf },
}

/// Find the manifest in `dir` (no upward search).
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    let path = dir.join(MANIFEST_NAME);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ManifestError::NotFound {
            dir: dir.to_path_buf(),
        })
    }
}

/// A loaded project.
#[derive(Debug)]
pub struct Workspace {
    manifest: Manifest,

    manifest_path: PathBuf,

    /// Directory containing the manifest; relative paths resolve here
    root: PathBuf,
}

impl Workspace {
    /// Load the workspace for a manifest path.
    pub fn new(manifest_path: &Path, ctx: &GlobalContext) -> Result<Self> {
        let manifest_path = if manifest_path.is_absolute() {
            manifest_path.to_path_buf()
        } else {
            ctx.cwd().join(manifest_path)
        };

        let manifest = Manifest::load(&manifest_path)?;
        let root = manifest.manifest_dir.clone();

        Ok(Workspace {
            manifest,
            manifest_path,
            root,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Get the project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .assetstage directory.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR_NAME)
    }

    /// Path of the fingerprint cache.
    pub fn fingerprint_path(&self) -> PathBuf {
        self.state_dir().join("fingerprints.json")
    }

    /// Ensure the state directory exists.
    pub fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create state directory: {}", dir.display()))
    }
}
