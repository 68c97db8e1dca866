//! Implementation of `assetstage run`.

use anyhow::Result;

use crate::builder::events::duration_ms;
use crate::builder::template::write_config;
use crate::builder::{Executor, RunReport, StageContext, StageEvent, StageOptions};
use crate::core::Workspace;
use crate::util::config::Config;
use crate::util::fs::relative_path;
use crate::util::shell::{Shell, Status};

/// Options for the run command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Steps to run (empty = the manifest's default steps)
    pub targets: Vec<String>,

    pub stage: StageOptions,
}

/// Run the staging pipeline.
///
/// Variant selection, graph construction and target resolution all happen
/// before the first file is written.
pub fn run(ws: &Workspace, config: &Config, opts: &RunOptions, shell: &Shell) -> Result<RunReport> {
    let ctx = StageContext::new(ws, config, &opts.stage)?;
    let manifest = ws.manifest();

    shell.status(
        Status::Variant,
        format!(
            "{} ({})",
            ctx.variant_name().unwrap_or("<none>"),
            ctx.build_type
        ),
    );

    let graph = ctx.build_graph(manifest)?;
    let targets = if opts.targets.is_empty() {
        manifest.default_steps()
    } else {
        opts.targets.clone()
    };
    let order = graph.resolve(&targets)?;

    tracing::debug!(
        "resolved {} step(s): {}",
        order.len(),
        order.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    let mut report = RunReport::default();
    let result = write_build_config(ws, &ctx, shell).and_then(|()| {
        ws.ensure_state_dir()?;
        Executor::new(shell, ws.fingerprint_path())
            .incremental(ctx.incremental)
            .jobs(ctx.jobs)
            .run(&order, &mut report)?;
        Ok(())
    });

    shell.json_event(&StageEvent::RunFinished {
        success: result.is_ok(),
        variant: ctx.variant_name().map(str::to_string),
        build_type: ctx.build_type.clone(),
        steps_run: report.run_count(),
        steps_fresh: report.fresh_count(),
        duration_ms: duration_ms(report.duration),
        error: result.as_ref().err().map(|e| format!("{:#}", e)),
    });

    result?;

    shell.status(
        Status::Finished,
        format!(
            "{} step(s), {} fresh, in {:.2}s",
            report.steps.len(),
            report.fresh_count(),
            report.duration.as_secs_f64()
        ),
    );

    Ok(report)
}

fn write_build_config(ws: &Workspace, ctx: &StageContext, shell: &Shell) -> Result<()> {
    let Some(ref decl) = ws.manifest().build_config else {
        return Ok(());
    };

    let file = ctx.build_config(decl)?;
    write_config(&file.path, &file.block)?;
    shell.status(
        Status::Wrote,
        relative_path(ws.root(), &file.path).display(),
    );
    Ok(())
}
