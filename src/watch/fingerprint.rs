// src/watch/fingerprint.rs

//! Content fingerprints for single directories.
//!
//! A [`DirectoryFingerprint`] condenses one directory's immediate regular
//! files into two digests:
//!
//! - the **code digest** covers files matching the configured watch pattern,
//! - the **test digest** covers files matching the fixed test-file suffix
//!   and additionally absorbs the code digest, so any code change surfaces
//!   through the test digest as well.
//!
//! Digests are built from file metadata (`name_size_mtimeNanos`), not file
//! contents, so a check is a single directory listing plus a few stat calls.
//! Alongside each digest the fingerprint keeps the moment that digest last
//! moved. Construction computes baseline digests but leaves both modified
//! times at `UNIX_EPOCH`: a freshly registered directory has, by definition,
//! not changed yet.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use regex::Regex;
use tracing::debug;

use super::watcher::DirectoryWatch;

/// File names with this suffix are test sources, never watched code, even
/// when they also match the watch pattern.
const TEST_FILE_SUFFIX: &str = "_test.go";

/// Point-in-time view of a fingerprint, safe to hand out without holding
/// any registry lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintSnapshot {
    pub path: PathBuf,
    pub code_modified: SystemTime,
    pub test_modified: SystemTime,
    pub deleted: bool,
}

/// Digest-based change detector for one directory.
#[derive(Debug)]
pub struct DirectoryFingerprint {
    path: PathBuf,
    watch_regex: Regex,
    code_digest: blake3::Hash,
    test_digest: blake3::Hash,
    code_modified: SystemTime,
    test_modified: SystemTime,
    deleted: bool,
    /// Keeps the native notification plumbing for this directory alive; the
    /// watch ends when the fingerprint is dropped.
    _watch: Option<DirectoryWatch>,
}

impl DirectoryFingerprint {
    /// Scan `path` and record its baseline digests.
    ///
    /// A directory that cannot be listed starts out in the deleted state.
    /// Modified times start at `UNIX_EPOCH` regardless of the files' actual
    /// mtimes; only a later [`check_for_changes`](Self::check_for_changes)
    /// moves them.
    pub fn new(path: PathBuf, watch_regex: Regex) -> Self {
        let scan = scan_directory(&path, &watch_regex);
        Self {
            path,
            watch_regex,
            code_digest: scan.code_digest,
            test_digest: scan.test_digest,
            code_modified: UNIX_EPOCH,
            test_modified: UNIX_EPOCH,
            deleted: scan.deleted,
            _watch: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> FingerprintSnapshot {
        FingerprintSnapshot {
            path: self.path.clone(),
            code_modified: self.code_modified,
            test_modified: self.test_modified,
            deleted: self.deleted,
        }
    }

    pub(crate) fn attach_watch(&mut self, watch: DirectoryWatch) {
        self._watch = Some(watch);
    }

    /// Rescan the directory and fold the result into the stored state.
    ///
    /// Returns `true` when anything moved. Transitions:
    ///
    /// - directory unlistable: both modified times are stamped with the wall
    ///   clock the moment the disappearance is first seen, and every check
    ///   while the directory stays gone keeps returning `true`;
    /// - digest moved: the matching modified time takes the scan's max mtime
    ///   for that file class, and only that one;
    /// - no difference: digests are still overwritten, times stay put.
    pub fn check_for_changes(&mut self) -> bool {
        let scan = scan_directory(&self.path, &self.watch_regex);

        if scan.deleted {
            if !self.deleted {
                let now = SystemTime::now();
                self.code_modified = now;
                self.test_modified = now;
                debug!(path = %self.path.display(), "watched directory disappeared");
            }
            self.deleted = true;
            return true;
        }
        self.deleted = false;

        let code_moved = scan.code_digest != self.code_digest;
        if code_moved {
            self.code_modified = scan.code_modified;
        }
        let test_moved = scan.test_digest != self.test_digest;
        if test_moved {
            self.test_modified = scan.test_modified;
        }
        self.code_digest = scan.code_digest;
        self.test_digest = scan.test_digest;

        if code_moved || test_moved {
            debug!(
                path = %self.path.display(),
                code = code_moved,
                test = test_moved,
                "directory fingerprint changed"
            );
            true
        } else {
            false
        }
    }
}

struct DirectoryScan {
    code_digest: blake3::Hash,
    test_digest: blake3::Hash,
    code_modified: SystemTime,
    test_modified: SystemTime,
    deleted: bool,
}

/// List `path` and digest its immediate regular files.
///
/// Test files are matched before the watch pattern, so a name satisfying
/// both counts as a test file only. Subdirectories are never descended into;
/// nested directories get fingerprints of their own.
fn scan_directory(path: &Path, watch_regex: &Regex) -> DirectoryScan {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(_) => {
            return DirectoryScan {
                code_digest: digest_sorted_tokens(Vec::new(), None),
                test_digest: digest_sorted_tokens(Vec::new(), None),
                code_modified: UNIX_EPOCH,
                test_modified: UNIX_EPOCH,
                deleted: true,
            };
        }
    };

    let mut code_tokens = Vec::new();
    let mut test_tokens = Vec::new();
    let mut code_modified = UNIX_EPOCH;
    let mut test_modified = UNIX_EPOCH;

    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);

        if name.ends_with(TEST_FILE_SUFFIX) {
            test_tokens.push(metadata_token(&name, metadata.len(), modified));
            if modified > test_modified {
                test_modified = modified;
            }
        } else if watch_regex.is_match(&name) {
            code_tokens.push(metadata_token(&name, metadata.len(), modified));
            if modified > code_modified {
                code_modified = modified;
            }
        }
    }

    let code_digest = digest_sorted_tokens(code_tokens, None);
    let test_digest = digest_sorted_tokens(test_tokens, Some(&code_digest));

    // A code edit is also a reason to re-run tests, so the test side may
    // never lag behind the code side.
    if code_modified > test_modified {
        test_modified = code_modified;
    }

    DirectoryScan {
        code_digest,
        test_digest,
        code_modified,
        test_modified,
        deleted: false,
    }
}

/// Metadata token for one file: `name_size_mtimeNanos`.
fn metadata_token(name: &str, size: u64, modified: SystemTime) -> String {
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{name}_{size}_{nanos}")
}

/// Digest a set of metadata tokens, optionally absorbing another digest.
///
/// Tokens are sorted first so the result does not depend on directory
/// listing order.
fn digest_sorted_tokens(mut tokens: Vec<String>, absorb: Option<&blake3::Hash>) -> blake3::Hash {
    tokens.sort_unstable();

    let mut hasher = Hasher::new();
    for token in &tokens {
        hasher.update(token.as_bytes());
        hasher.update(b"\n");
    }
    if let Some(digest) = absorb {
        hasher.update(digest.as_bytes());
    }
    hasher.finalize()
}
