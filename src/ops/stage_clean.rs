//! Implementation of `assetstage clean`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::fingerprint::FingerprintCache;
use crate::builder::{StageContext, StageOptions};
use crate::core::error::StageError;
use crate::core::step::{StagingStep, StepAction};
use crate::core::Workspace;
use crate::util::config::Config;
use crate::util::fs::{is_inside, lexical_normalize, remove_path_if_exists};

/// Options for the clean command.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Steps to clean (empty = every step, plus the build-config file)
    pub targets: Vec<String>,

    pub stage: StageOptions,

    /// List what would be removed without removing it
    pub dry_run: bool,
}

/// Result of a clean.
#[derive(Debug, Clone, Default)]
pub struct CleanResult {
    /// Paths that existed and were removed (or would be, on a dry run)
    pub removed: Vec<PathBuf>,
}

/// Paths a step produces.
pub fn produced_paths(step: &StagingStep) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for action in &step.actions {
        match action {
            StepAction::Mkdir { path } | StepAction::Touch { path } => paths.push(path.clone()),
            StepAction::Copy(spec) => paths.push(spec.dest.clone()),
            StepAction::WriteConfig(file) => paths.push(file.path.clone()),
            StepAction::Exec(_) => {}
        }
    }
    paths.extend(step.outputs.iter().cloned());
    paths
}

/// Remove what the selected steps produce.
pub fn clean(ws: &Workspace, config: &Config, opts: &CleanOptions) -> Result<CleanResult> {
    let ctx = StageContext::new(ws, config, &opts.stage)?;
    let manifest = ws.manifest();
    let graph = ctx.build_graph(manifest)?;

    let names = if opts.targets.is_empty() {
        graph.step_names()
    } else {
        opts.targets.clone()
    };

    let mut paths = Vec::new();
    for name in &names {
        let step = graph.get(name).ok_or_else(|| StageError::UnknownStep {
            name: name.clone(),
            referenced_by: None,
            available: graph.step_names(),
        })?;
        paths.extend(produced_paths(step));
    }

    if opts.targets.is_empty() {
        if let Some(ref decl) = manifest.build_config {
            paths.push(ctx.build_config(decl)?.path);
        }
    }

    let root = lexical_normalize(ws.root());
    let mut paths: Vec<PathBuf> = paths.iter().map(|p| lexical_normalize(p)).collect();
    for path in &paths {
        check_removable(path, &root)?;
    }
    paths.sort();
    paths.dedup();

    let mut result = CleanResult::default();
    for path in paths {
        // A parent removed earlier in this loop already took the child
        if result.removed.iter().any(|r| path.starts_with(r)) {
            continue;
        }
        let existed = if opts.dry_run {
            path.exists()
        } else {
            remove_path_if_exists(&path)?
        };
        if existed {
            tracing::debug!("removed {}", path.display());
            result.removed.push(path);
        }
    }

    if !opts.dry_run {
        let fp_path = ws.fingerprint_path();
        let mut cache = FingerprintCache::load_or_default(&fp_path);
        for name in &names {
            cache.remove(name);
        }
        if fp_path.exists() {
            cache.save(&fp_path)?;
        }
    }

    Ok(result)
}

fn check_removable(path: &Path, root: &Path) -> Result<(), StageError> {
    if !is_inside(path, root) || path == root {
        return Err(StageError::OutsideProject {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::stage_run::{run, RunOptions};
    use crate::test_support::{project, write_tree};
    use crate::util::shell::Shell;
    use crate::util::GlobalContext;

    const MANIFEST: &str = r#"
[project]
name = "viewer"

[build-config]
path = "generated/BuildConfig.ini"

[[step]]
name = "copyAppResources"

[[step.copy]]
into = "res_generated/raw"
from = ["LICENSE"]
rename = [["LICENSE", "license.txt"]]

[[step]]
name = "createStrippedConfig"
mkdir = ["assets/share/config/soffice.cfg"]
touch = ["assets/share/registry/empty"]
"#;

    fn workspace(dir: &Path) -> Workspace {
        let gctx = GlobalContext::with_cwd(dir.to_path_buf()).unwrap();
        Workspace::new(&dir.join("Stage.toml"), &gctx).unwrap()
    }

    #[test]
    fn test_clean_removes_exactly_produced_paths() {
        let tmp = project(MANIFEST);
        write_tree(tmp.path(), &[("LICENSE", "mpl"), ("assets/keep.txt", "user file")]);
        let ws = workspace(tmp.path());

        run(&ws, &Config::default(), &RunOptions::default(), &Shell::silent()).unwrap();
        assert!(tmp.path().join("res_generated/raw/license.txt").is_file());

        let result = clean(&ws, &Config::default(), &CleanOptions::default()).unwrap();
        assert_eq!(result.removed.len(), 4);
        assert!(!tmp.path().join("res_generated/raw").exists());
        assert!(!tmp.path().join("assets/share/config/soffice.cfg").exists());
        assert!(!tmp.path().join("assets/share/registry/empty").exists());
        assert!(!tmp.path().join("generated/BuildConfig.ini").exists());
        assert!(tmp.path().join("assets/keep.txt").is_file());
        assert!(tmp.path().join("LICENSE").is_file());

        // Nothing left to remove
        let again = clean(&ws, &Config::default(), &CleanOptions::default()).unwrap();
        assert!(again.removed.is_empty());
    }

    #[test]
    fn test_clean_single_step_and_dry_run() {
        let tmp = project(MANIFEST);
        write_tree(tmp.path(), &[("LICENSE", "mpl")]);
        let ws = workspace(tmp.path());
        run(&ws, &Config::default(), &RunOptions::default(), &Shell::silent()).unwrap();

        let opts = CleanOptions {
            targets: vec!["createStrippedConfig".into()],
            dry_run: true,
            ..CleanOptions::default()
        };
        let result = clean(&ws, &Config::default(), &opts).unwrap();
        assert_eq!(result.removed.len(), 2);
        assert!(tmp.path().join("assets/share/registry/empty").exists());

        let opts = CleanOptions {
            dry_run: false,
            ..opts
        };
        clean(&ws, &Config::default(), &opts).unwrap();
        assert!(!tmp.path().join("assets/share/registry/empty").exists());
        assert!(tmp.path().join("res_generated/raw/license.txt").exists());
    }

    #[test]
    fn test_clean_refuses_outside_project() {
        let tmp = project(
            "[project]\nname = \"x\"\n[[step]]\nname = \"escape\"\nmkdir = [\"../elsewhere\"]\n",
        );
        let ws = workspace(tmp.path());
        let err = clean(&ws, &Config::default(), &CleanOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::OutsideProject { .. })
        ));
    }

    #[test]
    fn test_clean_refuses_project_root() {
        let tmp = project(
            "[project]\nname = \"x\"\n[[step]]\nname = \"all\"\n[[step.copy]]\nfrom = \"src\"\n",
        );
        let ws = workspace(tmp.path());
        assert!(clean(&ws, &Config::default(), &CleanOptions::default()).is_err());
    }

    #[test]
    fn test_clean_unknown_step() {
        let tmp = project(MANIFEST);
        let ws = workspace(tmp.path());
        let opts = CleanOptions {
            targets: vec!["nope".into()],
            ..CleanOptions::default()
        };
        assert!(clean(&ws, &Config::default(), &opts).is_err());
    }
}
