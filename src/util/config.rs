//! Configuration file support for assetstage.
//!
//! Two configuration file locations are read:
//! - Global: `config.toml` in the platform config directory - user-wide defaults
//!   and build host settings shared by every project
//! - Project: `.assetstage/config.toml` - project-specific overrides
//!
//! Project config takes precedence over global config.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// assetstage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Staging settings
    pub stage: StageConfig,

    /// Build host variables (e.g. the path of the native install tree).
    /// These override `[vars]` in Stage.toml.
    pub vars: BTreeMap<String, String>,
}

/// Staging-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct StageConfig {
    /// Variant used when none is given on the command line
    pub variant: Option<String>,

    /// Build type used when none is given (default: debug)
    pub build_type: Option<String>,

    /// Worker threads for file copies (None = auto-detect)
    pub jobs: Option<usize>,

    /// Skip steps whose outputs are newer than their inputs (default: true)
    pub incremental: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.stage.variant.is_some() {
            self.stage.variant = other.stage.variant;
        }
        if other.stage.build_type.is_some() {
            self.stage.build_type = other.stage.build_type;
        }
        if other.stage.jobs.is_some() {
            self.stage.jobs = other.stage.jobs;
        }
        if other.stage.incremental.is_some() {
            self.stage.incremental = other.stage.incremental;
        }

        self.vars.extend(other.vars);
    }

    /// Whether incremental skipping is enabled.
    pub fn incremental(&self) -> bool {
        self.stage.incremental.unwrap_or(true)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.assetstage/config.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}
