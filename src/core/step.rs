//! Staging steps.
//!
//! A [`StagingStep`] is the fully resolved form of a `[[step]]` table: every
//! variable is expanded and every path is absolute. It is what the task
//! graph stores and what the executor runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::builder::template::ConfigBlock;

/// A named unit of staging work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingStep {
    /// Unique step name
    pub name: String,

    /// Human-readable description
    pub description: Option<String>,

    /// Steps that must run before this one
    pub depends_on: Vec<String>,

    /// Extra inputs beyond the files matched by copy specs
    pub inputs: Vec<PathBuf>,

    /// Extra outputs beyond copy destinations, config files and touched files
    pub outputs: Vec<PathBuf>,

    /// Work to perform, in execution order
    pub actions: Vec<StepAction>,
}

impl StagingStep {
    pub fn new(name: impl Into<String>) -> Self {
        StagingStep {
            name: name.into(),
            description: None,
            depends_on: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if !self.depends_on.contains(&dep) {
                self.depends_on.push(dep);
            }
        }
        self
    }

    pub fn with_action(mut self, action: StepAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn copy_specs(&self) -> impl Iterator<Item = &CopySpec> {
        self.actions.iter().filter_map(|a| match a {
            StepAction::Copy(spec) => Some(spec),
            _ => None,
        })
    }

    pub fn config_files(&self) -> impl Iterator<Item = &ConfigFile> {
        self.actions.iter().filter_map(|a| match a {
            StepAction::WriteConfig(file) => Some(file),
            _ => None,
        })
    }

    /// Whether any action regenerates a config file.
    ///
    /// Config blocks are rewritten on every run, so such steps are never
    /// considered fresh.
    pub fn writes_config(&self) -> bool {
        self.config_files().next().is_some()
    }
}

/// One unit of work inside a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepAction {
    /// Create a directory (and parents)
    Mkdir { path: PathBuf },
    /// Write an empty file, replacing any existing content
    Touch { path: PathBuf },
    /// Copy matched files from source roots into a destination root
    Copy(CopySpec),
    /// Render an ini-style config file
    WriteConfig(ConfigFile),
    /// Run an external program
    Exec(ExecSpec),
}

impl StepAction {
    /// Execution rank: mkdir, touch, copy, config, exec.
    pub fn rank(&self) -> u8 {
        match self {
            StepAction::Mkdir { .. } => 0,
            StepAction::Touch { .. } => 1,
            StepAction::Copy(_) => 2,
            StepAction::WriteConfig(_) => 3,
            StepAction::Exec(_) => 4,
        }
    }
}

/// File-copy specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopySpec {
    /// Source roots, searched in order
    pub sources: Vec<PathBuf>,

    /// Destination root; relative paths below a source root are preserved here
    pub dest: PathBuf,

    /// Include patterns (empty = everything)
    pub includes: Vec<String>,

    /// Exclude patterns, applied after includes
    pub excludes: Vec<String>,

    /// File name rewrites, applied in order
    pub renames: Vec<RenameRule>,

    /// Per-line token substitutions, applied in order
    pub filters: Vec<LineFilter>,

    /// Skip absent source roots instead of failing
    pub optional: bool,
}

impl CopySpec {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        CopySpec {
            sources: Vec::new(),
            dest: dest.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
            renames: Vec::new(),
            filters: Vec::new(),
            optional: false,
        }
    }

    pub fn from(mut self, source: impl Into<PathBuf>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push(RenameRule::new(from, to));
        self
    }

    pub fn filter(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(LineFilter::new(token, value));
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Apply all rename rules to a file name.
    pub fn rename_file(&self, file_name: &str) -> String {
        self.renames
            .iter()
            .fold(file_name.to_string(), |name, rule| rule.apply(&name))
    }
}

/// Literal substring replacement on a file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

impl RenameRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        RenameRule {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn apply(&self, name: &str) -> String {
        if self.from.is_empty() {
            return name.to_string();
        }
        name.replace(&self.from, &self.to)
    }
}

/// Literal token replacement applied to every line of a copied file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFilter {
    pub token: String,
    pub value: String,
}

impl LineFilter {
    pub fn new(token: impl Into<String>, value: impl Into<String>) -> Self {
        LineFilter {
            token: token.into(),
            value: value.into(),
        }
    }

    pub fn apply(&self, line: &str) -> String {
        if self.token.is_empty() {
            return line.to_string();
        }
        line.replace(&self.token, &self.value)
    }
}

/// A config file to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub block: ConfigBlock,
}

/// An external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecSpec {
    /// Program name (looked up in PATH) or path relative to `cwd`
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}
