//! Implementation of `assetstage digest`.
//!
//! A tree digest covers the sorted relative paths and contents of every file
//! under a directory, so two identical staged trees always hash the same.

use std::path::Path;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::util::fs::{relative_path, to_slash};

/// Digest of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDigest {
    /// Hex-encoded SHA-256
    pub digest: String,

    /// Number of files covered
    pub files: usize,
}

/// Hash every file under `dir`.
pub fn digest(dir: &Path) -> Result<TreeDigest> {
    if !dir.is_dir() {
        bail!("`{}` is not a directory", dir.display());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            let rel = to_slash(&relative_path(dir, entry.path()));
            entries.push((rel, entry.into_path()));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel, path) in &entries {
        let contents =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        hasher.update((rel.len() as u64).to_le_bytes());
        hasher.update(rel.as_bytes());
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }

    Ok(TreeDigest {
        digest: hex::encode(hasher.finalize()),
        files: entries.len(),
    })
}
