//! `{{name}}` variable interpolation for manifest strings.
//!
//! Only the double-brace form is recognised. Shell-style `$APP_DATA_DIR` and
//! `${BRAND_BASE_DIR}` references are runtime bootstrap syntax of the
//! packaged application and pass through untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::error::StageError;

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("variable pattern is valid")
});

/// Set of variables available to a staging run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars {
    values: BTreeMap<String, String>,
}

impl Vars {
    pub fn new() -> Self {
        Vars::default()
    }

    /// Define or override a variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Define several variables; later entries win.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in entries {
            self.insert(k, v);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Expand every `{{name}}` in `input`.
    ///
    /// Values may themselves reference other variables. `context` names the
    /// place being expanded and is carried into the error.
    pub fn expand(&self, input: &str, context: &str) -> Result<String, StageError> {
        let mut stack = Vec::new();
        self.expand_inner(input, context, &mut stack)
    }

    fn expand_inner(
        &self,
        input: &str,
        context: &str,
        stack: &mut Vec<String>,
    ) -> Result<String, StageError> {
        if !input.contains("{{") {
            return Ok(input.to_string());
        }

        let mut failure = None;
        let expanded = VAR_RE.replace_all(input, |caps: &Captures<'_>| {
            if failure.is_some() {
                return String::new();
            }
            let name = &caps[1];
            match self.lookup(name, context, stack) {
                Ok(value) => value,
                Err(e) => {
                    failure = Some(e);
                    String::new()
                }
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }

    fn lookup(
        &self,
        name: &str,
        context: &str,
        stack: &mut Vec<String>,
    ) -> Result<String, StageError> {
        let undefined = || StageError::UndefinedVariable {
            name: name.to_string(),
            context: context.to_string(),
        };

        // A variable that (indirectly) references itself can never resolve.
        if stack.iter().any(|s| s == name) {
            return Err(undefined());
        }

        let raw = self.values.get(name).ok_or_else(undefined)?;
        stack.push(name.to_string());
        let value = self.expand_inner(raw, context, stack);
        stack.pop();
        value
    }

    /// Expand each string of a list.
    pub fn expand_all(&self, inputs: &[String], context: &str) -> Result<Vec<String>, StageError> {
        inputs.iter().map(|s| self.expand(s, context)).collect()
    }

    /// Expand a path template and anchor it at `base` unless it is absolute.
    pub fn expand_path(&self, base: &Path, input: &str, context: &str) -> Result<PathBuf, StageError> {
        let expanded = self.expand(input, context)?;
        Ok(base.join(expanded))
    }
}
