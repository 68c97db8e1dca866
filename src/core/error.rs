//! Fatal staging errors.
//!
//! Every variant aborts the run. Failures inside a step's actions are wrapped
//! in [`StageError::StepFailed`] so the message always names the step.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error raised while configuring or running a staging pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum StageError {
    #[error("step `{step}` would create a dependency cycle: {}", .cycle.join(" -> "))]
    #[diagnostic(
        code(assetstage::graph::cycle),
        help("remove one of the `depends-on` entries along the cycle")
    )]
    CyclicDependency { step: String, cycle: Vec<String> },

    #[error("step `{name}` is declared more than once")]
    #[diagnostic(
        code(assetstage::graph::duplicate),
        help("step names must be unique within Stage.toml")
    )]
    DuplicateStep { name: String },

    #[error("unknown step `{name}`{}", referenced_by_suffix(.referenced_by))]
    #[diagnostic(
        code(assetstage::graph::unknown_step),
        help("run `assetstage plan` to see the declared steps")
    )]
    UnknownStep {
        name: String,
        referenced_by: Option<String>,
        available: Vec<String>,
    },

    #[error("unknown variant `{name}` (available: {})", list_or_none(.available))]
    #[diagnostic(
        code(assetstage::variant::unknown),
        help("run `assetstage variants` to list the declared variants")
    )]
    UnknownVariant { name: String, available: Vec<String> },

    #[error("unknown build type `{name}` (available: {})", list_or_none(.available))]
    #[diagnostic(code(assetstage::variant::unknown_build_type))]
    UnknownBuildType { name: String, available: Vec<String> },

    #[error("source root does not exist: {}", .path.display())]
    #[diagnostic(
        code(assetstage::stage::missing_source),
        help("check the build host variables, or mark the copy `optional = true`")
    )]
    MissingSource { path: PathBuf },

    #[error(
        "`{}` and `{}` both stage to {}",
        .first.display(),
        .second.display(),
        .dest.display()
    )]
    #[diagnostic(
        code(assetstage::stage::destination_conflict),
        help("narrow the include patterns or adjust the rename rules")
    )]
    DestinationConflict {
        first: PathBuf,
        second: PathBuf,
        dest: PathBuf,
    },

    #[error("undefined variable `{name}` in {context}")]
    #[diagnostic(
        code(assetstage::vars::undefined),
        help("define it under [vars] in Stage.toml or .assetstage/config.toml, or pass --var")
    )]
    UndefinedVariable { name: String, context: String },

    #[error("refusing to remove {} outside the project root", .path.display())]
    #[diagnostic(code(assetstage::clean::outside_project))]
    OutsideProject { path: PathBuf },

    #[error("step `{step}` failed")]
    #[diagnostic(code(assetstage::stage::step_failed))]
    StepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StageError {
    /// Name of the step this error is attributed to, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            StageError::StepFailed { step, .. } | StageError::CyclicDependency { step, .. } => {
                Some(step)
            }
            StageError::UnknownStep { referenced_by, .. } => referenced_by.as_deref(),
            _ => None,
        }
    }

    /// The innermost `StageError` in a `StepFailed` chain, or `self`.
    pub fn root(&self) -> &StageError {
        match self {
            StageError::StepFailed { source, .. } => source
                .downcast_ref::<StageError>()
                .map(StageError::root)
                .unwrap_or(self),
            other => other,
        }
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(step) => format!(" (required by `{}`)", step),
        None => String::new(),
    }
}
