//! `assetstage clean` command

use anyhow::Result;

use super::Session;
use crate::cli::CleanArgs;
use assetstage::ops::{clean, CleanOptions};
use assetstage::util::fs::relative_path;
use assetstage::util::shell::Status;

pub fn execute(args: CleanArgs, session: &Session) -> Result<()> {
    let (ws, config) = session.workspace()?;

    let opts = CleanOptions {
        targets: args.targets,
        stage: args.selection.stage_options(),
        dry_run: args.dry_run,
    };
    let result = clean(&ws, &config, &opts)?;

    for path in &result.removed {
        let rel = relative_path(ws.root(), path);
        if args.dry_run {
            session
                .shell
                .status(Status::Info, format!("would remove {}", rel.display()));
        } else {
            session.shell.status(Status::Removed, rel.display());
        }
    }
    if result.removed.is_empty() {
        session.shell.status(Status::Info, "nothing to clean");
    }

    Ok(())
}
