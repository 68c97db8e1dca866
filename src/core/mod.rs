//! Core data structures for assetstage.
//!
//! This module contains the foundational types used throughout assetstage:
//! - The Stage.toml manifest and workspace
//! - Staging steps and their actions
//! - Variants, build types and variable interpolation
//! - The fatal error type

pub mod error;
pub mod manifest;
pub mod step;
pub mod variant;
pub mod vars;
pub mod workspace;

pub use error::StageError;
pub use manifest::{Manifest, StepDecl, MANIFEST_NAME};
pub use step::{ConfigFile, CopySpec, ExecSpec, LineFilter, RenameRule, StagingStep, StepAction};
pub use variant::{select_variant, BuildTypes, FlagValue, Variant, VariantTable};
pub use vars::Vars;
pub use workspace::{find_manifest, Workspace};
