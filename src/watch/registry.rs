// src/watch/registry.rs

//! Shared bookkeeping for every directory fingerprint in play.
//!
//! The registry is the one place fingerprints live. On-demand sweeps, suite
//! lookups and native notification rechecks all go through the same internal
//! lock, so two checks can never interleave on one entry and usage tracking
//! sees every lookup.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use regex::Regex;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::errors::Result;

use super::fingerprint::{DirectoryFingerprint, FingerprintSnapshot};
use super::mux::ChangeMultiplexer;
use super::watcher::spawn_directory_watch;

/// Native notification wiring shared by all directory watches.
#[derive(Debug)]
pub(crate) struct NativeContext {
    pub(crate) mux: ChangeMultiplexer,
    pub(crate) runtime: Handle,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryInner {
    entries: HashMap<PathBuf, DirectoryFingerprint>,
    /// `Some` while a usage window is open; collects every path touched by
    /// `add` or `get` until the window closes.
    used_paths: Option<HashSet<PathBuf>>,
}

impl RegistryInner {
    /// Recheck one entry on behalf of a native watch task.
    ///
    /// The entry may have been pruned while the event was in flight; that is
    /// not a change.
    pub(crate) fn recheck(&mut self, path: &Path) -> bool {
        match self.entries.get_mut(path) {
            Some(fingerprint) => fingerprint.check_for_changes(),
            None => false,
        }
    }
}

/// Recover the inner state even if a panic poisoned the lock; every critical
/// section leaves the map usable.
pub(crate) fn lock_inner(shared: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe, path-keyed collection of directory fingerprints.
#[derive(Debug)]
pub struct FingerprintRegistry {
    shared: Arc<Mutex<RegistryInner>>,
    watch_regex: Regex,
    native: Option<NativeContext>,
}

impl FingerprintRegistry {
    /// Registry that rechecks directories only on demand.
    pub fn new(watch_regex: Regex) -> Self {
        Self {
            shared: Arc::default(),
            watch_regex,
            native: None,
        }
    }

    /// Registry that additionally enrolls every added directory with the
    /// platform's native file notifications, feeding `mux`.
    pub fn with_native(watch_regex: Regex, mux: ChangeMultiplexer, runtime: Handle) -> Self {
        Self {
            shared: Arc::default(),
            watch_regex,
            native: Some(NativeContext { mux, runtime }),
        }
    }

    /// Register `path`, fingerprinting it now if it is new, and return the
    /// current snapshot.
    ///
    /// Re-adding a known path never rescans: the entry keeps its baseline,
    /// so changes landing between two `add` calls stay visible to the next
    /// sweep. Paths are keyed by their absolute form, so one directory
    /// reached through different spellings shares one entry.
    pub fn add(&self, path: impl AsRef<Path>) -> Result<FingerprintSnapshot> {
        let path = normalize_path(path.as_ref());
        let mut inner = lock_inner(&self.shared);

        if let Some(used) = inner.used_paths.as_mut() {
            used.insert(path.clone());
        }

        if let Some(fingerprint) = inner.entries.get(&path) {
            return Ok(fingerprint.snapshot());
        }

        let mut fingerprint = DirectoryFingerprint::new(path.clone(), self.watch_regex.clone());
        if let Some(native) = &self.native {
            let watch = spawn_directory_watch(path.clone(), Arc::downgrade(&self.shared), native)?;
            fingerprint.attach_watch(watch);
        }
        let snapshot = fingerprint.snapshot();
        debug!(path = %path.display(), "tracking directory");
        inner.entries.insert(path, fingerprint);
        Ok(snapshot)
    }

    /// Snapshot for a known path.
    ///
    /// Unknown paths are not created, but the lookup still counts toward the
    /// open usage window, if any.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<FingerprintSnapshot> {
        let path = normalize_path(path.as_ref());
        let mut inner = lock_inner(&self.shared);

        if let Some(used) = inner.used_paths.as_mut() {
            used.insert(path.clone());
        }

        inner.entries.get(&path).map(DirectoryFingerprint::snapshot)
    }

    /// Recheck every tracked directory and return the changed ones, sorted.
    pub fn check_for_changes(&self) -> Vec<PathBuf> {
        let mut inner = lock_inner(&self.shared);
        let mut modified: Vec<PathBuf> = inner
            .entries
            .values_mut()
            .filter_map(|fingerprint| {
                fingerprint
                    .check_for_changes()
                    .then(|| fingerprint.path().to_path_buf())
            })
            .collect();
        modified.sort();
        modified
    }

    /// Open a usage window: until the matching
    /// [`stop_tracking_usage_and_prune`](Self::stop_tracking_usage_and_prune),
    /// every path touched by `add` or `get` counts as in use.
    pub fn start_tracking_usage(&self) {
        lock_inner(&self.shared).used_paths = Some(HashSet::new());
    }

    /// Close the usage window and drop every entry not touched during it.
    ///
    /// Dropping an entry also tears down its native watch, so pruned
    /// directories stop producing pulses. Without an open window this is a
    /// no-op.
    pub fn stop_tracking_usage_and_prune(&self) {
        let mut inner = lock_inner(&self.shared);
        let Some(used) = inner.used_paths.take() else {
            return;
        };
        let initial_len = inner.entries.len();
        inner.entries.retain(|path, _| used.contains(path));
        let removed = initial_len - inner.entries.len();
        if removed > 0 {
            info!(removed, "pruned fingerprints of unused directories");
        }
    }
}

/// Key paths by their absolute form so different spellings of one directory
/// collapse into a single entry. Deleted directories must still normalize,
/// so this does not hit the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
