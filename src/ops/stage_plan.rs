//! Implementation of `assetstage plan`.
//!
//! Shows the resolved execution order without running anything.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::builder::fingerprint::{self, FingerprintCache, Freshness};
use crate::builder::StageContext;
use crate::core::step::StepAction;
use crate::core::Workspace;
use crate::ops::stage_run::RunOptions;
use crate::util::config::Config;
use crate::util::fs::relative_path;

/// A resolved plan.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub variant: Option<String>,
    pub build_type: String,
    pub steps: Vec<PlannedStep>,
}

/// One step of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub depends_on: Vec<String>,
    /// Would be skipped by an incremental run
    pub fresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<String>,
    pub actions: Vec<StepAction>,
}

/// Resolve the steps a `run` with the same options would execute.
pub fn plan(ws: &Workspace, config: &Config, opts: &RunOptions) -> Result<Plan> {
    let ctx = StageContext::new(ws, config, &opts.stage)?;
    let manifest = ws.manifest();
    let graph = ctx.build_graph(manifest)?;

    let targets = if opts.targets.is_empty() {
        manifest.default_steps()
    } else {
        opts.targets.clone()
    };
    let order = graph.resolve(&targets)?;

    let cache = FingerprintCache::load_or_default(&ws.fingerprint_path());
    let steps = order
        .into_iter()
        .map(|step| {
            let (fresh, stale_reason) = if ctx.incremental {
                match fingerprint::check(step, &cache) {
                    Freshness::Fresh => (true, None),
                    Freshness::Stale(reason) => (false, Some(reason.to_string())),
                }
            } else {
                (false, Some("incremental runs are disabled".to_string()))
            };

            let mut actions = step.actions.clone();
            actions.sort_by_key(StepAction::rank);

            PlannedStep {
                name: step.name.clone(),
                description: step.description.clone(),
                depends_on: step.depends_on.clone(),
                fresh,
                stale_reason,
                actions,
            }
        })
        .collect();

    Ok(Plan {
        variant: ctx.variant_name().map(str::to_string),
        build_type: ctx.build_type,
        steps,
    })
}

/// Human-readable rendering of a plan, paths shown relative to `root`.
pub fn format_plan(plan: &Plan, root: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "variant: {}  build type: {}",
        plan.variant.as_deref().unwrap_or("<none>"),
        plan.build_type
    );

    for (i, step) in plan.steps.iter().enumerate() {
        let marker = if step.fresh { " (fresh)" } else { "" };
        let _ = writeln!(out, "{:>3}. {}{}", i + 1, step.name, marker);
        if let Some(ref desc) = step.description {
            let _ = writeln!(out, "       {}", desc);
        }
        if !step.depends_on.is_empty() {
            let _ = writeln!(out, "       after: {}", step.depends_on.join(", "));
        }
        for action in &step.actions {
            let _ = writeln!(out, "       {}", describe_action(action, root));
        }
    }
    out
}

fn describe_action(action: &StepAction, root: &Path) -> String {
    let rel = |p: &Path| relative_path(root, p).display().to_string();
    match action {
        StepAction::Mkdir { path } => format!("mkdir  {}", rel(path)),
        StepAction::Touch { path } => format!("touch  {}", rel(path)),
        StepAction::Copy(spec) => {
            let sources: Vec<String> = spec.sources.iter().map(|s| rel(s)).collect();
            format!("copy   {} -> {}", sources.join(", "), rel(&spec.dest))
        }
        StepAction::WriteConfig(file) => format!("config {}", rel(&file.path)),
        StepAction::Exec(exec) => format!("exec   {} {}", exec.program, exec.args.join(" ")),
    }
}
