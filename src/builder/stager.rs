//! File staging for copy specs.
//!
//! A [`CopySpec`] is first expanded into a list of [`CopyOp`]s (one per
//! matched file), which are then executed in parallel. The relative path of
//! a file below its source root is preserved in the destination; rename
//! rules only touch the final file name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::builder::pattern::PathMatcher;
use crate::core::error::StageError;
use crate::core::step::CopySpec;
use crate::util::fs::{copy_file, ensure_dir, read_to_string, relative_path, to_slash, write_string};

/// A single planned file copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOp {
    /// Absolute source file
    pub source: PathBuf,

    /// Path of the source below its root, `/`-separated
    pub rel: String,

    /// Absolute destination file
    pub dest: PathBuf,
}

/// Outcome of staging one copy spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Destination files written, in collection order
    pub written: Vec<PathBuf>,

    /// Source roots skipped because they were absent and optional
    pub skipped_roots: Vec<PathBuf>,
}

/// Files a copy spec would stage, in deterministic order.
///
/// Returns the planned copies plus the optional roots that were absent.
pub fn collect(spec: &CopySpec) -> Result<(Vec<CopyOp>, Vec<PathBuf>)> {
    let matcher = PathMatcher::new(&spec.includes, &spec.excludes)?;
    let mut ops = Vec::new();
    let mut skipped = Vec::new();

    for root in &spec.sources {
        if !root.exists() {
            if spec.optional {
                tracing::debug!("skipping absent optional source {}", root.display());
                skipped.push(root.clone());
                continue;
            }
            return Err(StageError::MissingSource { path: root.clone() }.into());
        }

        if root.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if matcher.matches(&name) {
                ops.push(CopyOp {
                    source: root.clone(),
                    dest: spec.dest.join(spec.rename_file(&name)),
                    rel: name,
                });
            }
            continue;
        }

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("failed to walk directory: {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = relative_path(root, entry.path());
            let rel = to_slash(&rel_path);
            if !matcher.matches(&rel) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let mut dest = spec.dest.clone();
            if let Some(parent) = rel_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                dest.push(parent);
            }
            dest.push(spec.rename_file(&file_name));

            ops.push(CopyOp {
                source: entry.path().to_path_buf(),
                rel,
                dest,
            });
        }
    }

    check_conflicts(&ops)?;
    Ok((ops, skipped))
}

fn check_conflicts(ops: &[CopyOp]) -> Result<(), StageError> {
    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for op in ops {
        if let Some(first) = seen.insert(&op.dest, &op.source) {
            return Err(StageError::DestinationConflict {
                first: first.to_path_buf(),
                second: op.source.clone(),
                dest: op.dest.clone(),
            });
        }
    }
    Ok(())
}

/// Stage every file matched by `spec`.
///
/// The destination root is created even when nothing matches.
pub fn stage(spec: &CopySpec) -> Result<StageReport> {
    let (ops, skipped_roots) = collect(spec)?;
    ensure_dir(&spec.dest)?;

    let results: Vec<Result<()>> = ops.par_iter().map(|op| copy_one(spec, op)).collect();
    for result in results {
        result?;
    }

    tracing::debug!("staged {} files into {}", ops.len(), spec.dest.display());

    Ok(StageReport {
        written: ops.into_iter().map(|op| op.dest).collect(),
        skipped_roots,
    })
}

fn copy_one(spec: &CopySpec, op: &CopyOp) -> Result<()> {
    if spec.filters.is_empty() {
        return copy_file(&op.source, &op.dest);
    }

    let content = read_to_string(&op.source)
        .with_context(|| format!("cannot filter non-text file `{}`", op.rel))?;

    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let filtered = spec
            .filters
            .iter()
            .fold(line.to_string(), |acc, filter| filter.apply(&acc));
        out.push_str(&filtered);
    }

    write_string(&op.dest, &out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_tree;
    use tempfile::TempDir;

    #[test]
    fn test_stage_preserves_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("instdir/share");
        write_tree(
            &src,
            &[
                ("registry/main.xcd", "main"),
                ("registry/res/writer.xcd", "writer"),
                ("filter/oox-drawingml-cs-presets", "presets"),
                ("config/images_colibre.zip", "zip"),
            ],
        );

        let dest = tmp.path().join("assets/share");
        let spec = CopySpec::new(&dest)
            .from(&src)
            .include(["registry/**", "filter/**"])
            .exclude(["registry/main.xcd"]);

        let report = stage(&spec).unwrap();
        assert_eq!(report.written.len(), 2);
        assert!(dest.join("registry/res/writer.xcd").is_file());
        assert!(dest.join("filter/oox-drawingml-cs-presets").is_file());
        assert!(!dest.join("registry/main.xcd").exists());
        assert!(!dest.join("config").exists());
    }

    #[test]
    fn test_rename_applies_to_file_name_only() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("program");
        write_tree(&src, &[("types.rdb", "t"), ("types.rdb.d/types.rdb", "nested")]);

        let dest = tmp.path().join("out");
        let spec = CopySpec::new(&dest)
            .from(&src)
            .rename("types.rdb", "udkapi.rdb");

        stage(&spec).unwrap();
        assert!(dest.join("udkapi.rdb").is_file());
        assert!(dest.join("types.rdb.d/udkapi.rdb").is_file());
    }

    #[test]
    fn test_file_source_root() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("LICENSE", "mpl"), ("NOTICE", "notice")]);

        let dest = tmp.path().join("res_generated/raw");
        let spec = CopySpec::new(&dest)
            .from(tmp.path().join("LICENSE"))
            .from(tmp.path().join("NOTICE"))
            .rename("LICENSE", "license.txt")
            .rename("NOTICE", "notice.txt");

        stage(&spec).unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("license.txt")).unwrap(), "mpl");
        assert_eq!(std::fs::read_to_string(dest.join("notice.txt")).unwrap(), "notice");
    }

    #[test]
    fn test_filter_replaces_tokens_and_keeps_line_endings() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("etc");
        write_tree(
            &src,
            &[(
                "fonts.conf",
                "<dir>/data/data/@@APPLICATION_ID@@/fonts</dir>\r\n<cache/>\nlast",
            )],
        );

        let dest = tmp.path().join("out");
        let spec = CopySpec::new(&dest)
            .from(&src)
            .filter("@@APPLICATION_ID@@", "org.example.viewer");

        stage(&spec).unwrap();
        assert_eq!(
            std::fs::read_to_string(dest.join("fonts.conf")).unwrap(),
            "<dir>/data/data/org.example.viewer/fonts</dir>\r\n<cache/>\nlast"
        );
    }

    #[test]
    fn test_filter_rejects_binary() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("bin");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("blob"), [0xff, 0xfe, 0x00]).unwrap();

        let spec = CopySpec::new(tmp.path().join("out"))
            .from(&src)
            .filter("x", "y");
        let err = stage(&spec).unwrap_err();
        assert!(format!("{:#}", err).contains("blob"));
    }

    #[test]
    fn test_missing_source_is_fatal_unless_optional() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let spec = CopySpec::new(tmp.path().join("out")).from(&missing);
        let err = stage(&spec).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::MissingSource { .. })
        ));

        let report = stage(&spec.optional(true)).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.skipped_roots, vec![missing]);
        assert!(tmp.path().join("out").is_dir());
    }

    #[test]
    fn test_destination_conflict() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("a/fonts.conf", "a"), ("b/fonts.conf", "b")]);

        let spec = CopySpec::new(tmp.path().join("out"))
            .from(tmp.path().join("a"))
            .from(tmp.path().join("b"));
        let err = collect(&spec).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::DestinationConflict { .. })
        ));
    }

    #[test]
    fn test_collect_order_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("src/b", ""), ("src/a", ""), ("src/c/d", "")]);

        let spec = CopySpec::new(tmp.path().join("out")).from(tmp.path().join("src"));
        let (ops, _) = collect(&spec).unwrap();
        let rels: Vec<_> = ops.iter().map(|op| op.rel.as_str()).collect();
        assert_eq!(rels, vec!["a", "b", "c/d"]);
    }
}
