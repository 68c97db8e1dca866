//! Step executor with progress reporting.
//!
//! Steps run one at a time in the order given (dependencies first). The
//! first failure aborts the run; steps that already finished keep their
//! outputs and fingerprints.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::builder::events::{duration_ms, StageEvent};
use crate::builder::fingerprint::{self, FingerprintCache, Freshness, StepFingerprint};
use crate::builder::stager;
use crate::builder::template::write_config;
use crate::core::error::StageError;
use crate::core::step::{ExecSpec, StagingStep, StepAction};
use crate::util::fs::{ensure_dir, write_atomic};
use crate::util::process::{resolve_program, ProcessBuilder};
use crate::util::shell::{Shell, Status};

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub name: String,

    /// Skipped because its outputs were up to date
    pub fresh: bool,

    /// Files written by the step
    pub files: Vec<PathBuf>,
}

/// Summary of a run, filled in as steps complete.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<StepOutcome>,
    pub duration: Duration,
}

impl RunReport {
    pub fn run_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.fresh).count()
    }

    pub fn fresh_count(&self) -> usize {
        self.steps.iter().filter(|s| s.fresh).count()
    }
}

/// Runs resolved steps.
pub struct Executor<'a> {
    shell: &'a Shell,
    cache_path: PathBuf,
    incremental: bool,
    jobs: Option<usize>,
}

impl<'a> Executor<'a> {
    /// Create an executor that persists fingerprints at `cache_path`.
    pub fn new(shell: &'a Shell, cache_path: PathBuf) -> Self {
        Executor {
            shell,
            cache_path,
            incremental: true,
            jobs: None,
        }
    }

    /// Allow skipping fresh steps.
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// Worker threads for file copies.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Run `steps` in order, recording each outcome in `report`.
    pub fn run(&self, steps: &[&StagingStep], report: &mut RunReport) -> Result<(), StageError> {
        let start = Instant::now();

        let mut cache = FingerprintCache::load_or_default(&self.cache_path);
        let pb = self.shell.progress(steps.len() as u64);

        let result = self.with_pool(|| -> Result<(), StageError> {
            for step in steps {
                pb.set_message(step.name.clone());
                report.steps.push(self.run_one(step, &mut cache)?);
                pb.inc(1);
            }
            Ok(())
        });

        pb.finish_and_clear();
        report.duration = start.elapsed();
        result
    }

    /// Run `f` on a pool of `jobs` threads, or on the global pool when no
    /// job count was given.
    fn with_pool<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        let Some(jobs) = self.jobs else {
            return f();
        };
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(f),
            Err(e) => {
                self.shell
                    .warn(format_args!("using the default thread pool: {}", e));
                f()
            }
        }
    }

    fn run_one(&self, step: &StagingStep, cache: &mut FingerprintCache) -> Result<StepOutcome, StageError> {
        let mut stale_reason = None;
        if self.incremental {
            match fingerprint::check(step, cache) {
                Freshness::Fresh => {
                    tracing::debug!("step `{}` is fresh", step.name);
                    self.shell.status(Status::Fresh, &step.name);
                    self.shell.json_event(&StageEvent::step_fresh(&step.name));
                    return Ok(StepOutcome {
                        name: step.name.clone(),
                        fresh: true,
                        files: Vec::new(),
                    });
                }
                Freshness::Stale(reason) => {
                    tracing::debug!("step `{}` is stale: {}", step.name, reason);
                    stale_reason = Some(reason.to_string());
                }
            }
        }

        tracing::info!("running step `{}`", step.name);
        self.shell.status(Status::Staging, &step.name);
        self.shell
            .json_event(&StageEvent::step_started(&step.name, stale_reason));

        let started = Instant::now();

        // A half-finished step must not look fresh next time.
        cache.remove(&step.name);

        let files = match execute_actions(step) {
            Ok(files) => files,
            Err(source) => {
                self.save_cache(cache);
                return Err(StageError::StepFailed {
                    step: step.name.clone(),
                    source,
                });
            }
        };

        match fingerprint::definition_hash(step) {
            Ok(definition) => cache.update(step.name.clone(), StepFingerprint { definition }),
            Err(e) => self
                .shell
                .warn(format_args!("not recording fingerprint for `{}`: {:#}", step.name, e)),
        }
        self.save_cache(cache);

        self.shell.json_event(&StageEvent::StepFinished {
            step: step.name.clone(),
            files: files.clone(),
            duration_ms: duration_ms(started.elapsed()),
        });

        Ok(StepOutcome {
            name: step.name.clone(),
            fresh: false,
            files,
        })
    }

    fn save_cache(&self, cache: &FingerprintCache) {
        if let Err(e) = cache.save(&self.cache_path) {
            self.shell
                .warn(format_args!("failed to save fingerprints: {:#}", e));
        }
    }
}

/// Run a step's actions in rank order, returning the files written.
pub fn execute_actions(step: &StagingStep) -> Result<Vec<PathBuf>> {
    let mut actions: Vec<&StepAction> = step.actions.iter().collect();
    actions.sort_by_key(|a| a.rank());

    let mut files = Vec::new();
    for action in actions {
        match action {
            StepAction::Mkdir { path } => ensure_dir(path)?,
            StepAction::Touch { path } => {
                write_atomic(path, b"")?;
                files.push(path.clone());
            }
            StepAction::Copy(spec) => {
                let report = stager::stage(spec)?;
                files.extend(report.written);
            }
            StepAction::WriteConfig(file) => {
                write_config(&file.path, &file.block)?;
                files.push(file.path.clone());
            }
            StepAction::Exec(exec) => run_exec(exec)?,
        }
    }
    Ok(files)
}

fn run_exec(exec: &ExecSpec) -> Result<()> {
    let program = resolve_program(&exec.program, &exec.cwd)?;
    let mut cmd = ProcessBuilder::new(&program).args(&exec.args).cwd(&exec.cwd);
    for (key, value) in &exec.env {
        cmd = cmd.env(key, value);
    }

    tracing::debug!("executing {}", cmd.display_command());
    let output = cmd.exec_and_check()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        tracing::debug!("{}", stdout.trim_end());
    }
    Ok(())
}
