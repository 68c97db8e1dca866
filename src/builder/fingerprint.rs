//! Step fingerprinting for incremental runs.
//!
//! A step is fresh when its instantiated definition is unchanged since the
//! last successful run and every output exists and is at least as new as
//! every input. Skipping is an optimization only; `--force` bypasses it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::stager;
use crate::core::step::{StagingStep, StepAction};
use crate::util::fs::{modified, write_atomic};
use crate::util::hash::sha256_str;

/// Fingerprint of one successful step run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFingerprint {
    /// Hash of the instantiated step definition
    pub definition: String,
}

/// Fingerprints of all steps of a project, stored in
/// `.assetstage/fingerprints.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FingerprintCache {
    pub steps: BTreeMap<String, StepFingerprint>,
}

impl FingerprintCache {
    /// Load fingerprint cache from a file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(FingerprintCache::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cache: FingerprintCache = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cache)
    }

    /// Load, falling back to an empty cache on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring fingerprint cache: {:#}", e);
            FingerprintCache::default()
        })
    }

    /// Save fingerprint cache to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())
    }

    pub fn get(&self, step: &str) -> Option<&StepFingerprint> {
        self.steps.get(step)
    }

    pub fn update(&mut self, step: impl Into<String>, fingerprint: StepFingerprint) {
        self.steps.insert(step.into(), fingerprint);
    }

    pub fn remove(&mut self, step: &str) {
        self.steps.remove(step);
    }
}

/// Hash of a step's fully instantiated definition.
///
/// Changes to variables, the selected variant or the manifest all show up
/// here even when no file timestamps move.
pub fn definition_hash(step: &StagingStep) -> Result<String> {
    let json = serde_json::to_string(step)
        .with_context(|| format!("failed to serialize step `{}`", step.name))?;
    Ok(sha256_str(&json))
}

/// Files a step reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepIo {
    pub inputs: Vec<PathBuf>,

    /// Files that must exist and be newer than every input
    pub outputs: Vec<PathBuf>,

    /// Directories that only need to exist
    pub dirs: Vec<PathBuf>,
}

impl StepIo {
    /// Compute the inputs and outputs of a step.
    ///
    /// Copy specs are expanded, so every matched source file is an input and
    /// every staged destination file is an output.
    pub fn for_step(step: &StagingStep) -> Result<Self> {
        let mut io = StepIo {
            inputs: step.inputs.clone(),
            outputs: step.outputs.clone(),
            dirs: Vec::new(),
        };

        for action in &step.actions {
            match action {
                StepAction::Mkdir { path } => io.dirs.push(path.clone()),
                StepAction::Touch { path } => io.outputs.push(path.clone()),
                StepAction::Copy(spec) => {
                    let (ops, _) = stager::collect(spec)?;
                    io.dirs.push(spec.dest.clone());
                    for op in ops {
                        io.inputs.push(op.source);
                        io.outputs.push(op.dest);
                    }
                }
                StepAction::WriteConfig(file) => io.outputs.push(file.path.clone()),
                StepAction::Exec(_) => {}
            }
        }

        Ok(io)
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.dirs.is_empty()
    }
}

/// Why a step has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// Never ran, or the cache was cleared
    NoFingerprint,
    DefinitionChanged,
    /// Nothing to compare against
    NoOutputs,
    /// Config blocks are regenerated on every run
    WritesConfig,
    MissingOutput(PathBuf),
    InputNewer(PathBuf),
    /// Inputs could not be enumerated; the run will report the real error
    Unresolvable(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoFingerprint => write!(f, "no previous run"),
            StaleReason::DefinitionChanged => write!(f, "step definition changed"),
            StaleReason::NoOutputs => write!(f, "step declares no outputs"),
            StaleReason::WritesConfig => write!(f, "config files are always regenerated"),
            StaleReason::MissingOutput(path) => write!(f, "output {} is missing", path.display()),
            StaleReason::InputNewer(path) => {
                write!(f, "input {} is newer than the outputs", path.display())
            }
            StaleReason::Unresolvable(msg) => write!(f, "{}", msg),
        }
    }
}

/// Result of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Decide whether `step` can be skipped.
pub fn check(step: &StagingStep, cache: &FingerprintCache) -> Freshness {
    if step.writes_config() {
        return Freshness::Stale(StaleReason::WritesConfig);
    }

    let current = match definition_hash(step) {
        Ok(hash) => hash,
        Err(e) => return Freshness::Stale(StaleReason::Unresolvable(format!("{:#}", e))),
    };
    match cache.get(&step.name) {
        None => return Freshness::Stale(StaleReason::NoFingerprint),
        Some(fp) if fp.definition != current => {
            return Freshness::Stale(StaleReason::DefinitionChanged)
        }
        Some(_) => {}
    }

    let io = match StepIo::for_step(step) {
        Ok(io) => io,
        Err(e) => return Freshness::Stale(StaleReason::Unresolvable(format!("{:#}", e))),
    };
    if io.is_empty() {
        return Freshness::Stale(StaleReason::NoOutputs);
    }

    for dir in &io.dirs {
        if !dir.is_dir() {
            return Freshness::Stale(StaleReason::MissingOutput(dir.clone()));
        }
    }

    let mut oldest_output: Option<SystemTime> = None;
    for output in &io.outputs {
        match modified(output) {
            Ok(t) => oldest_output = Some(oldest_output.map_or(t, |o| o.min(t))),
            Err(_) => return Freshness::Stale(StaleReason::MissingOutput(output.clone())),
        }
    }

    let Some(oldest_output) = oldest_output else {
        return Freshness::Fresh;
    };

    // Outputs must be strictly newer; an input touched in the same mtime
    // tick as the last write counts as changed.
    for input in &io.inputs {
        match modified(input) {
            Ok(t) if t >= oldest_output => {
                return Freshness::Stale(StaleReason::InputNewer(input.clone()))
            }
            Ok(_) => {}
            Err(e) => return Freshness::Stale(StaleReason::Unresolvable(format!("{:#}", e))),
        }
    }

    Freshness::Fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::template::{ConfigBlock, ConfigSection};
    use crate::core::step::{ConfigFile, CopySpec};
    use crate::test_support::{set_mtime_past, write_tree};
    use tempfile::TempDir;

    fn copy_step(root: &Path) -> StagingStep {
        StagingStep::new("copyFonts").with_action(StepAction::Copy(
            CopySpec::new(root.join("assets/fonts")).from(root.join("instdir/fonts")),
        ))
    }

    fn record(step: &StagingStep) -> FingerprintCache {
        let mut cache = FingerprintCache::default();
        cache.update(
            step.name.clone(),
            StepFingerprint {
                definition: definition_hash(step).unwrap(),
            },
        );
        cache
    }

    #[test]
    fn test_fresh_after_copy() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("instdir/fonts/Liberation.ttf", "font")]);
        set_mtime_past(&tmp.path().join("instdir/fonts/Liberation.ttf"));

        let step = copy_step(tmp.path());
        if let StepAction::Copy(spec) = &step.actions[0] {
            stager::stage(spec).unwrap();
        }

        assert_eq!(check(&step, &FingerprintCache::default()), Freshness::Stale(StaleReason::NoFingerprint));
        assert!(check(&step, &record(&step)).is_fresh());
    }

    #[test]
    fn test_missing_output_is_stale() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("instdir/fonts/Liberation.ttf", "font")]);
        let step = copy_step(tmp.path());

        match check(&step, &record(&step)) {
            Freshness::Stale(StaleReason::MissingOutput(_)) => {}
            other => panic!("unexpected freshness: {:?}", other),
        }
    }

    #[test]
    fn test_newer_input_is_stale() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("instdir/fonts/Liberation.ttf", "font")]);
        let step = copy_step(tmp.path());
        if let StepAction::Copy(spec) = &step.actions[0] {
            stager::stage(spec).unwrap();
        }
        set_mtime_past(&tmp.path().join("assets/fonts/Liberation.ttf"));

        match check(&step, &record(&step)) {
            Freshness::Stale(StaleReason::InputNewer(path)) => {
                assert!(path.ends_with("instdir/fonts/Liberation.ttf"))
            }
            other => panic!("unexpected freshness: {:?}", other),
        }
    }

    #[test]
    fn test_input_with_same_mtime_is_stale() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("instdir/fonts/Liberation.ttf", "font")]);
        let step = copy_step(tmp.path());
        if let StepAction::Copy(spec) = &step.actions[0] {
            stager::stage(spec).unwrap();
        }

        let output = tmp.path().join("assets/fonts/Liberation.ttf");
        let input = tmp.path().join("instdir/fonts/Liberation.ttf");
        let written = std::fs::metadata(&output).unwrap().modified().unwrap();
        std::fs::File::options()
            .write(true)
            .open(&input)
            .unwrap()
            .set_modified(written)
            .unwrap();

        assert!(matches!(
            check(&step, &record(&step)),
            Freshness::Stale(StaleReason::InputNewer(_))
        ));
    }

    #[test]
    fn test_deleted_source_root_is_unresolvable() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("instdir/fonts/Liberation.ttf", "font")]);
        set_mtime_past(&tmp.path().join("instdir/fonts/Liberation.ttf"));
        let step = copy_step(tmp.path());
        if let StepAction::Copy(spec) = &step.actions[0] {
            stager::stage(spec).unwrap();
        }
        let cache = record(&step);
        assert!(check(&step, &cache).is_fresh());

        std::fs::remove_dir_all(tmp.path().join("instdir")).unwrap();
        match check(&step, &cache) {
            Freshness::Stale(StaleReason::Unresolvable(msg)) => {
                assert!(msg.contains("source root does not exist"), "{}", msg)
            }
            other => panic!("unexpected freshness: {:?}", other),
        }
    }

    #[test]
    fn test_definition_change_is_stale() {
        let tmp = TempDir::new().unwrap();
        let step = copy_step(tmp.path());
        let cache = record(&step);

        let changed = StagingStep::new("copyFonts").with_action(StepAction::Copy(
            CopySpec::new(tmp.path().join("assets/fonts"))
                .from(tmp.path().join("instdir/fonts"))
                .include(["*.ttf"]),
        ));
        assert_eq!(check(&changed, &cache), Freshness::Stale(StaleReason::DefinitionChanged));
    }

    #[test]
    fn test_config_steps_always_run() {
        let step = StagingStep::new("createRCfiles").with_action(StepAction::WriteConfig(
            ConfigFile {
                path: PathBuf::from("/p/assets/program/unorc"),
                block: ConfigBlock::new().with_section(ConfigSection::new("Bootstrap")),
            },
        ));
        assert_eq!(check(&step, &record(&step)), Freshness::Stale(StaleReason::WritesConfig));
    }

    #[test]
    fn test_step_without_outputs_always_runs() {
        let step = StagingStep::new("preBuild").depends_on(["copyAssets"]);
        assert_eq!(check(&step, &record(&step)), Freshness::Stale(StaleReason::NoOutputs));
    }

    #[test]
    fn test_mkdir_only_needs_existence() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("assets/share/config/soffice.cfg");
        std::fs::create_dir_all(&dir).unwrap();

        let step = StagingStep::new("createStrippedConfig")
            .with_action(StepAction::Mkdir { path: dir.clone() });
        assert!(check(&step, &record(&step)).is_fresh());

        std::fs::remove_dir(&dir).unwrap();
        assert_eq!(
            check(&step, &record(&step)),
            Freshness::Stale(StaleReason::MissingOutput(dir))
        );
    }

    #[test]
    fn test_cache_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".assetstage/fingerprints.json");
        let step = StagingStep::new("a");

        record(&step).save(&path).unwrap();
        let loaded = FingerprintCache::load(&path).unwrap();
        assert_eq!(loaded.get("a"), record(&step).get("a"));

        std::fs::write(&path, "not json").unwrap();
        assert!(FingerprintCache::load(&path).is_err());
        assert!(FingerprintCache::load_or_default(&path).steps.is_empty());
    }
}
