//! `assetstage init` command

use std::path::PathBuf;

use anyhow::Result;

use super::Session;
use crate::cli::InitArgs;
use assetstage::ops::{init_project, InitOptions};
use assetstage::util::shell::Status;

pub fn execute(args: InitArgs, session: &Session) -> Result<()> {
    let path = args.path.unwrap_or_else(|| PathBuf::from("."));

    let opts = InitOptions {
        name: args.name,
        application_id: args.application_id,
    };

    let manifest_path = init_project(&path, &opts)?;
    session
        .shell
        .status(Status::Created, manifest_path.display());

    Ok(())
}
