//! Staging engine.
//!
//! Turns a manifest into a task graph for the selected variant, then runs the
//! resolved steps: file staging, config rendering, and external commands.

pub mod context;
pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod graph;
pub mod pattern;
pub mod stager;
pub mod template;

pub use context::{StageContext, StageOptions};
pub use events::StageEvent;
pub use executor::{Executor, RunReport, StepOutcome};
pub use graph::TaskGraph;
pub use stager::{stage, StageReport};
pub use template::{render, write_config, ConfigBlock, ConfigSection};
