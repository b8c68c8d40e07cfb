#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Builder for an on-disk suite directory to simplify test setup.
///
/// Creates the directory (and parents) on `build` and fills it with the
/// requested files. Paths are returned so tests can mutate the files later.
pub struct SuiteDirBuilder {
    root: PathBuf,
    files: Vec<(String, String)>,
}

impl SuiteDirBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Vec::new(),
        }
    }

    /// Add a file with explicit contents.
    pub fn with_file(mut self, name: &str, contents: &str) -> Self {
        self.files.push((name.to_string(), contents.to_string()));
        self
    }

    /// Add a watched code file with placeholder contents.
    pub fn with_code_file(self, name: &str) -> Self {
        let contents = format!("package code // {name}\n");
        self.with_file(name, &contents)
    }

    /// Add a test file with placeholder contents.
    pub fn with_test_file(self, name: &str) -> Self {
        let contents = format!("package code_test // {name}\n");
        self.with_file(name, &contents)
    }

    pub fn build(self) -> PathBuf {
        fs::create_dir_all(&self.root).expect("Failed to create suite directory");
        for (name, contents) in &self.files {
            fs::write(self.root.join(name), contents).expect("Failed to write suite file");
        }
        self.root
    }
}

/// Overwrite `path` after a short pause.
///
/// The pause guarantees the new mtime lands strictly after any baseline
/// captured before the call, even on filesystems whose timestamps come from
/// a coarse clock.
pub fn modify_after_delay(path: &Path, contents: &str) {
    std::thread::sleep(Duration::from_millis(50));
    fs::write(path, contents).expect("Failed to overwrite file");
}

/// Create or overwrite a file without any pause. Digest-level assertions
/// only need the size to move, not the mtime.
pub fn write_file(path: &Path, contents: &str) {
    fs::write(path, contents).expect("Failed to write file");
}

/// Remove a whole suite directory.
pub fn remove_dir(path: &Path) {
    fs::remove_dir_all(path).expect("Failed to remove directory");
}

/// Pin a file's mtime to an exact timestamp.
pub fn set_mtime(path: &Path, mtime: SystemTime) {
    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file for mtime update");
    file.set_modified(mtime).expect("Failed to set mtime");
}
