//! Ini-style config block rendering.
//!
//! Output format is line oriented:
//!
//! ```text
//! [Bootstrap]
//! InstallMode=auto
//! ProductKey=X 1.0
//! ```
//!
//! Sections appear in caller order, back to back, and every line ends with
//! `\n`. Files are always rewritten in full.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::util::fs::write_atomic;

/// One `[Section]` with its ordered entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigSection {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl ConfigSection {
    pub fn new(name: impl Into<String>) -> Self {
        ConfigSection {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }
}

/// An ordered list of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigBlock {
    pub sections: Vec<ConfigSection>,
}

impl ConfigBlock {
    pub fn new() -> Self {
        ConfigBlock::default()
    }

    pub fn with_section(mut self, section: ConfigSection) -> Self {
        self.sections.push(section);
        self
    }
}

/// Render a block to text.
pub fn render(block: &ConfigBlock) -> String {
    let mut out = String::new();
    for section in &block.sections {
        out.push('[');
        out.push_str(&section.name);
        out.push_str("]\n");
        for (key, value) in &section.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    }
    out
}

/// Render `block` and replace `path` with the result.
pub fn write_config(path: &Path, block: &ConfigBlock) -> Result<()> {
    tracing::debug!("writing config {}", path.display());
    write_atomic(path, render(block).as_bytes())
}
