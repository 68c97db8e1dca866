//! Implementation of `assetstage init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::MANIFEST_NAME;

/// Options for initializing a project.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Project name (default: directory name)
    pub name: Option<String>,

    /// Application identifier written to `[project]`
    pub application_id: Option<String>,
}

/// Generate a starter manifest.
pub fn generate_manifest(name: &str, application_id: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
application-id = "{application_id}"

[vars]
# Root of the native install tree to stage from
instdir = "../instdir"

[build-types.debug]
installLocation = "auto"

[build-types.release]
installLocation = "preferExternal"

[variants.default]
flags = {{ ALLOW_EDITING = true }}

[[step]]
name = "copyAssets"
description = "copies assets bundled with the application"
into = "assets"

[[step.copy]]
from = "{{{{instdir}}}}/share"
include = ["registry/**"]
optional = true

[[step]]
name = "createRCfiles"
depends-on = ["copyAssets"]

[[step.config]]
path = "assets/program/versionrc"

[[step.config.section]]
name = "Version"
entries = [["AllLanguages", "en-US"]]
"#
    )
}

/// Write a starter `Stage.toml` into `path`, creating the directory if needed.
pub fn init_project(path: &Path, opts: &InitOptions) -> Result<PathBuf> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    let manifest_path = path.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!("`{}` already exists in `{}`", MANIFEST_NAME, path.display());
    }

    let name = match opts.name {
        Some(ref name) => name.clone(),
        None => path
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "assets".to_string()),
    };
    let application_id = opts
        .application_id
        .clone()
        .unwrap_or_else(|| format!("org.example.{}", name.replace('-', "_")));

    fs::write(&manifest_path, generate_manifest(&name, &application_id))
        .with_context(|| format!("failed to write {}", MANIFEST_NAME))?;

    let gitignore = path.join(".gitignore");
    if !gitignore.exists() {
        fs::write(&gitignore, "# assetstage state\n.assetstage/\n")?;
    }

    Ok(manifest_path)
}
