//! High-level operations.
//!
//! This module contains the implementation of assetstage commands.

pub mod digest;
pub mod stage_clean;
pub mod stage_init;
pub mod stage_plan;
pub mod stage_run;

pub use digest::{digest, TreeDigest};
pub use stage_clean::{clean, produced_paths, CleanOptions, CleanResult};
pub use stage_init::{init_project, InitOptions};
pub use stage_plan::{format_plan, plan, Plan, PlannedStep};
pub use stage_run::{run, RunOptions};
