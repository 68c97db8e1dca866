//! User-friendly diagnostic messages.
//!
//! Every fatal error is printed as one `error:` line carrying the whole cause
//! chain, followed by the error code and a suggested fix when one is known.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as _;

use crate::core::error::StageError;
use crate::core::workspace::ManifestError;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no manifest file is found.
    pub const NO_MANIFEST: &str = "run `assetstage init` to create a Stage.toml";

    /// Suggestion when a step fails for a reason with no specific help.
    pub const STEP_FAILED: &str = "run `assetstage run --verbose` for more details";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Stable error code, e.g. `assetstage::graph::cycle`
    pub code: Option<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            code: None,
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Build a diagnostic from an error chain.
    ///
    /// The innermost [`StageError`] in the chain supplies the code, the help
    /// text and, for path errors, the location.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut diag = Diagnostic::error(format!("{:#}", err));

        if err.chain().any(|e| e.downcast_ref::<ManifestError>().is_some()) {
            return diag.with_suggestion(suggestions::NO_MANIFEST);
        }

        let Some(stage_err) = err
            .chain()
            .filter_map(|e| e.downcast_ref::<StageError>())
            .last()
        else {
            return diag;
        };

        diag.code = stage_err.code().map(|c| c.to_string());
        match stage_err.help() {
            Some(help) => diag = diag.with_suggestion(help.to_string()),
            None if matches!(stage_err, StageError::StepFailed { .. }) => {
                diag = diag.with_suggestion(suggestions::STEP_FAILED)
            }
            None => {}
        }

        match stage_err {
            StageError::MissingSource { path } | StageError::OutsideProject { path } => {
                diag.with_location(path.clone())
            }
            _ => diag,
        }
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (color, self.severity) {
            (true, Severity::Error) => "\x1b[1;31merror\x1b[0m",
            (true, Severity::Warning) => "\x1b[1;33mwarning\x1b[0m",
            (false, Severity::Error) => "error",
            (false, Severity::Warning) => "warning",
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        if let Some(ref code) = self.code {
            output.push_str(&format!("  = code: {}\n", code));
        }

        let help_prefix = if color {
            "\x1b[1;32mhelp\x1b[0m"
        } else {
            "help"
        };
        for suggestion in &self.suggestions {
            output.push_str(&format!("{}: {}\n", help_prefix, suggestion));
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("unknown variant `tablet`")
            .with_suggestion("run `assetstage variants` to list the declared variants")
            .with_location("/src/android/Stage.toml");

        let output = diag.format(false);
        assert!(output.starts_with("error: unknown variant `tablet`\n"));
        assert!(output.contains("  --> /src/android/Stage.toml\n"));
        assert!(output.contains("help: run `assetstage variants`"));
    }

    #[test]
    fn test_from_step_failure_uses_inner_help() {
        let inner = anyhow::Error::new(StageError::MissingSource {
            path: PathBuf::from("/instdir/share"),
        });
        let err = anyhow::Error::new(StageError::StepFailed {
            step: "copyAssets".into(),
            source: inner,
        });

        let diag = Diagnostic::from_error(&err);
        assert_eq!(
            diag.message,
            "step `copyAssets` failed: source root does not exist: /instdir/share"
        );
        assert_eq!(diag.code.as_deref(), Some("assetstage::stage::missing_source"));
        assert_eq!(diag.location, Some(PathBuf::from("/instdir/share")));
        assert!(diag.suggestions[0].contains("optional = true"));
    }

    #[test]
    fn test_warning_formatting() {
        let diag = Diagnostic::warning("failed to save fingerprints: read-only file system");
        assert_eq!(
            diag.format(false),
            "warning: failed to save fingerprints: read-only file system\n"
        );
        assert!(diag.format(true).starts_with("\x1b[1;33mwarning\x1b[0m: "));
    }

    #[test]
    fn test_from_plain_error() {
        let err = anyhow::anyhow!("disk full");
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.format(false), "error: disk full\n");
    }

    #[test]
    fn test_from_missing_manifest() {
        let err = anyhow::Error::new(ManifestError::NotFound {
            dir: PathBuf::from("/tmp"),
        });
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.suggestions, vec![suggestions::NO_MANIFEST]);
    }
}
