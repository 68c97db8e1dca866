//! `assetstage digest` command

use anyhow::Result;

use crate::cli::DigestArgs;
use assetstage::ops::digest;

pub fn execute(args: DigestArgs) -> Result<()> {
    let result = digest(&args.dir)?;
    println!("{}  {} ({} files)", result.digest, args.dir.display(), result.files);
    Ok(())
}
