// src/watch/watcher.rs

//! Native notification plumbing for one watched directory.
//!
//! Each tracked directory gets its own `notify` watcher. Raw events cross
//! from notify's blocking callback into the async world over an unbounded
//! channel; a per-directory task then rechecks the fingerprint through the
//! registry lock and emits a pulse only when the digest actually moved, so
//! editor noise (temp files, attribute churn) never reaches the merged
//! stream.

use std::path::PathBuf;
use std::sync::{Mutex, Weak};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::errors::Result;

use super::registry::{NativeContext, RegistryInner, lock_inner};

/// Buffer for filtered pulses of one directory while the merged stream is
/// busy.
const DIRECTORY_PULSE_CAPACITY: usize = 200;

/// Handle for one directory's native watch.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping the handle stops file watching and aborts
/// the recheck task.
pub(crate) struct DirectoryWatch {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for DirectoryWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatch").finish()
    }
}

/// Access events arrive constantly and never change a fingerprint; every
/// other kind warrants a recheck.
fn is_recheck_event(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

/// Start watching `path` and wire its pulses into the multiplexer.
///
/// The recheck task holds only a weak reference to the registry, so pruned
/// or dropped registries end the task instead of being kept alive by it.
pub(crate) fn spawn_directory_watch(
    path: PathBuf,
    registry: Weak<Mutex<RegistryInner>>,
    native: &NativeContext,
) -> Result<DirectoryWatch> {
    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // A closed channel means the watch is being torn down.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                eprintln!("suitewatch: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    // A directory that cannot be enrolled is still covered by on-demand
    // rechecks; the failed watch only costs latency.
    if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        warn!(path = %path.display(), error = %err, "could not watch directory natively");
    }

    let (pulse_tx, pulse_rx) = mpsc::channel(DIRECTORY_PULSE_CAPACITY);
    native.mux.register(pulse_rx);

    let task = native.runtime.spawn(async move {
        while let Some(event) = event_rx.recv().await {
            trace!(?event, path = %path.display(), "received notify event");
            if !is_recheck_event(&event.kind) {
                continue;
            }
            let changed = match registry.upgrade() {
                Some(shared) => lock_inner(&shared).recheck(&path),
                None => break,
            };
            if changed && pulse_tx.send(()).await.is_err() {
                break;
            }
        }
        debug!(path = %path.display(), "directory watch loop finished");
    });

    Ok(DirectoryWatch {
        _watcher: watcher,
        task,
    })
}
