//! assetstage - declarative asset staging for packaging pre-built native
//! applications into mobile bundles.
//!
//! A `Stage.toml` manifest declares named staging steps (copy trees, create
//! directories, write INI-style config files, run commands) and the
//! dependencies between them. This crate resolves the steps for a selected
//! variant and build type and executes them in dependency order.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test helpers for assetstage unit tests.
#[cfg(test)]
pub mod test_support;

pub use builder::{StageContext, StageOptions, TaskGraph};
pub use core::{Manifest, StageError, StagingStep, Variant, Workspace};
pub use util::context::GlobalContext;
