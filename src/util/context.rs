//! Global context for assetstage operations.
//!
//! Provides centralized access to the working directory, the global
//! configuration location, and manifest discovery.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::core::workspace::{find_manifest as ws_find_manifest, ManifestError};
use crate::util::config::{load_config, Config};

/// Project directories for assetstage
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("org", "assetstage", "assetstage"));

/// Name of the per-project state directory.
pub const STATE_DIR_NAME: &str = ".assetstage";

/// Global context containing configuration paths and the working directory.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Directory holding the global config.toml (None if the platform has no
    /// home directory)
    config_dir: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let config_dir = std::env::var_os("ASSETSTAGE_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                PROJECT_DIRS
                    .as_ref()
                    .map(|dirs| dirs.config_dir().to_path_buf())
            });

        Ok(GlobalContext { cwd, config_dir })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join("config.toml"))
    }

    /// Get the project-local state directory for a project root.
    pub fn project_state_dir(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR_NAME)
    }

    /// Load merged global + project configuration for a project root.
    pub fn load_config(&self, project_root: &Path) -> Config {
        let project_path = Self::project_state_dir(project_root).join("config.toml");
        load_config(self.config_path().as_deref(), &project_path)
    }

    /// Find Stage.toml starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        let mut current = self.cwd.clone();
        loop {
            match ws_find_manifest(&current) {
                Ok(path) => return Ok(path),
                Err(ManifestError::NotFound { .. }) => {
                    if !current.pop() {
                        return Err(ManifestError::NotFound {
                            dir: self.cwd.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Resolve an explicit `--manifest-path`, or search upward from cwd.
    pub fn manifest_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => {
                let path = self.cwd.join(path);
                if !path.is_file() {
                    anyhow::bail!("manifest path `{}` does not exist", path.display());
                }
                Ok(path)
            }
            None => Ok(self.find_manifest()?),
        }
    }
}
