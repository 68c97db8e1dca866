//! Test helpers for assetstage unit tests.
//!
//! Tests run against real temporary directories; these helpers keep the
//! setup of project trees short.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

/// Write `(relative path, contents)` pairs under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
    }
}

/// Create a temporary project containing `manifest` as its Stage.toml.
pub fn project(manifest: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("Stage.toml"), manifest).unwrap();
    tmp
}

/// Move a file's modification time one hour into the past.
pub fn set_mtime_past(path: &Path) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_and_tree() {
        let tmp = project("[project]\nname = \"viewer\"\n");
        write_tree(tmp.path(), &[("assets/a/b.txt", "b")]);
        assert!(tmp.path().join("Stage.toml").is_file());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("assets/a/b.txt")).unwrap(),
            "b"
        );
    }

    #[test]
    fn test_set_mtime_past() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("f", "x")]);
        let path = tmp.path().join("f");
        set_mtime_past(&path);
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(mtime < SystemTime::now() - Duration::from_secs(1800));
    }
}
