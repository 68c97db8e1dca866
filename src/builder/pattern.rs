//! Ant-style include/exclude matching on relative paths.
//!
//! Patterns are matched against `/`-separated paths relative to a source
//! root. `*` matches within one path component, `**` matches any number of
//! components, and a trailing `/` means "everything below".

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled include and exclude patterns.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PathMatcher {
    /// Compile pattern lists. An empty include list matches everything.
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        Ok(PathMatcher {
            includes: compile_all(includes)?,
            excludes: compile_all(excludes)?,
        })
    }

    /// Whether `rel_path` is included and not excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        let included = self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|p| p.matches_with(rel_path, MATCH_OPTIONS));

        included
            && !self
                .excludes
                .iter()
                .any(|p| p.matches_with(rel_path, MATCH_OPTIONS))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|raw| {
            let normalized = normalize(raw);
            Pattern::new(&normalized).with_context(|| format!("invalid pattern `{}`", raw))
        })
        .collect()
}

/// Rewrite an Ant-style pattern into the `glob` crate's dialect.
pub fn normalize(pattern: &str) -> String {
    let mut pattern = pattern
        .strip_prefix("./")
        .or_else(|| pattern.strip_prefix('/'))
        .unwrap_or(pattern)
        .to_string();

    if pattern.is_empty() || pattern.ends_with('/') {
        pattern.push_str("**");
    }

    let mut components: Vec<String> = pattern
        .split('/')
        .map(|c| {
            if c != "**" && c.contains("**") {
                c.replace("**", "*")
            } else {
                c.to_string()
            }
        })
        .collect();

    // glob's `a/**` only matches `a/` itself, not the files below it
    if components.last().map(String::as_str) == Some("**") {
        components.push("*".to_string());
    }

    components.join("/")
}
