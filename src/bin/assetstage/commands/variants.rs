//! `assetstage variants` command

use anyhow::Result;

use super::Session;

pub fn execute(session: &Session) -> Result<()> {
    let (ws, config) = session.workspace()?;
    let manifest = ws.manifest();
    let default = config.stage.variant.as_deref();

    if manifest.variants.is_empty() {
        println!("no variants declared");
    }
    for variant in manifest.variants.iter() {
        let marker = if Some(variant.name.as_str()) == default {
            " (default)"
        } else {
            ""
        };
        println!("{}{}", variant.name, marker);
        if let Some(ref path) = variant.manifest {
            println!("    manifest: {}", path.display());
        }
        for (flag, value) in &variant.flags {
            println!("    {} = {}", flag, value);
        }
    }

    let build_types = manifest.build_types.names();
    if !build_types.is_empty() {
        println!();
        println!("build types: {}", build_types.join(", "));
    }

    Ok(())
}
