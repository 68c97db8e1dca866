//! Staging event types for JSON output.
//!
//! These events are emitted one JSON object per line on stdout when using
//! `--message-format json`.
//!
//! # Event Types
//!
//! - `step-started`: A step began executing
//! - `step-fresh`: A step was skipped because its outputs are up to date
//! - `step-finished`: A step completed successfully
//! - `run-finished`: The run completed (success or failure)
//!
//! New fields may be added, but existing fields should not be removed or
//! renamed.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// An event emitted during a staging run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum StageEvent {
    StepStarted {
        step: String,
        /// Why the step could not be skipped
        #[serde(skip_serializing_if = "Option::is_none")]
        stale_reason: Option<String>,
    },

    StepFresh {
        step: String,
    },

    StepFinished {
        step: String,
        /// Files written by copy, touch and config actions
        files: Vec<PathBuf>,
        duration_ms: u64,
    },

    RunFinished {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
        build_type: String,
        steps_run: usize,
        steps_fresh: usize,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl StageEvent {
    pub fn step_started(step: impl Into<String>, stale_reason: Option<String>) -> Self {
        StageEvent::StepStarted {
            step: step.into(),
            stale_reason,
        }
    }

    pub fn step_fresh(step: impl Into<String>) -> Self {
        StageEvent::StepFresh { step: step.into() }
    }
}

/// Milliseconds for a `duration_ms` field, saturating at `u64::MAX`.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tags() {
        let json = serde_json::to_value(StageEvent::step_fresh("copyAssets")).unwrap();
        assert_eq!(json["reason"], "step-fresh");
        assert_eq!(json["step"], "copyAssets");

        let json = serde_json::to_value(StageEvent::step_started("copyAssets", None)).unwrap();
        assert_eq!(json["reason"], "step-started");
        assert!(json.get("stale_reason").is_none());
    }

    #[test]
    fn test_run_finished_schema() {
        let event = StageEvent::RunFinished {
            success: false,
            variant: Some("quest".into()),
            build_type: "release".into(),
            steps_run: 2,
            steps_fresh: 1,
            duration_ms: 15,
            error: Some("step `copyAssets` failed".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reason"], "run-finished");
        assert_eq!(json["success"], false);
        assert_eq!(json["variant"], "quest");
        assert_eq!(json["steps_fresh"], 1);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
