//! `assetstage run` command

use anyhow::Result;

use super::Session;
use crate::cli::RunArgs;
use assetstage::ops::{run, RunOptions};

pub fn execute(args: RunArgs, session: &Session) -> Result<()> {
    let (ws, config) = session.workspace()?;

    let mut stage = args.selection.stage_options();
    stage.jobs = args.jobs;
    stage.force = args.force;

    let opts = RunOptions {
        targets: args.targets,
        stage,
    };

    run(&ws, &config, &opts, &session.shell)?;
    Ok(())
}
