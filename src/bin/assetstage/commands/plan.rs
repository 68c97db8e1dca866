//! `assetstage plan` command

use anyhow::{Context, Result};

use super::Session;
use crate::cli::PlanArgs;
use assetstage::ops::{format_plan, plan, RunOptions};

pub fn execute(args: PlanArgs, session: &Session) -> Result<()> {
    let (ws, config) = session.workspace()?;

    let opts = RunOptions {
        targets: args.targets,
        stage: args.selection.stage_options(),
    };
    let plan = plan(&ws, &config, &opts)?;

    if args.json || session.shell.is_json() {
        let json = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
        println!("{}", json);
    } else {
        print!("{}", format_plan(&plan, ws.root()));
    }

    Ok(())
}
