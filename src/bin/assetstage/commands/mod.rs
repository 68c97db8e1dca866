//! Command implementations

pub mod clean;
pub mod completions;
pub mod digest;
pub mod init;
pub mod plan;
pub mod run;
pub mod variants;

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::SelectionArgs;
use assetstage::builder::StageOptions;
use assetstage::core::Workspace;
use assetstage::util::{Config, GlobalContext, Shell};

/// State shared by every command of one invocation.
pub struct Session {
    pub shell: Shell,
    pub manifest_path: Option<PathBuf>,
}

impl Session {
    /// Locate and load the workspace, plus the merged global + project config.
    pub fn workspace(&self) -> Result<(Workspace, Config)> {
        let ctx = GlobalContext::new()?;
        let manifest_path = ctx.manifest_path(self.manifest_path.as_deref())?;
        let ws = Workspace::new(&manifest_path, &ctx)?;
        let config = ctx.load_config(ws.root());
        tracing::debug!("using manifest {}", ws.manifest_path().display());
        Ok((ws, config))
    }
}

impl SelectionArgs {
    pub fn stage_options(&self) -> StageOptions {
        StageOptions {
            variant: self.variant.clone(),
            build_type: self.build_type.clone(),
            vars: self.vars.clone(),
            ..StageOptions::default()
        }
    }
}
