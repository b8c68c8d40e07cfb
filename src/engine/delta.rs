// src/engine/delta.rs

//! The reconciliation pass between "what is on disk" and "which suites the
//! runner knows about".

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::errors::{Result, SuitewatchError};
use crate::suite::{Suite, SuiteFactory, SuiteSpec};
use crate::watch::{ChangeMultiplexer, FingerprintRegistry};

use super::{Delta, SuiteErrors};

/// Tracks suites across reconciliation passes and computes what changed
/// between them.
///
/// The engine owns the suite collaborators and shares one
/// [`FingerprintRegistry`] with all of them. Every call to
/// [`delta`](Self::delta) compares the runner's current list of suites with
/// the engine's state and with the fingerprints on disk.
#[derive(Debug)]
pub struct DeltaEngine<F: SuiteFactory> {
    config: WatchConfig,
    factory: F,
    suites: HashMap<PathBuf, F::Suite>,
    registry: Arc<FingerprintRegistry>,
    pulse_rx: Option<mpsc::Receiver<()>>,
}

impl<F: SuiteFactory> DeltaEngine<F> {
    /// Build an engine from a validated config.
    ///
    /// With `native_notifications` set this must run inside a Tokio runtime;
    /// the merge task and all per-directory rechecks are spawned onto it.
    pub fn new(config: WatchConfig, factory: F) -> Result<Self> {
        let watch_regex = config.compile_watch_pattern()?;

        let (registry, pulse_rx) = if config.native_notifications {
            let runtime = Handle::try_current().map_err(|_| SuitewatchError::RuntimeUnavailable)?;
            let (mux, merged_rx) = ChangeMultiplexer::start(&runtime);
            (
                FingerprintRegistry::with_native(watch_regex, mux, runtime),
                Some(merged_rx),
            )
        } else {
            (FingerprintRegistry::new(watch_regex), None)
        };

        info!(
            native = config.native_notifications,
            pattern = %config.watch_pattern,
            "delta engine ready"
        );

        Ok(Self {
            config,
            factory,
            suites: HashMap::new(),
            registry: Arc::new(registry),
            pulse_rx,
        })
    }

    /// The registry shared with every suite collaborator.
    pub fn registry(&self) -> &Arc<FingerprintRegistry> {
        &self.registry
    }

    /// Take the merged pulse stream.
    ///
    /// `None` unless the engine was built with `native_notifications`, or
    /// when the stream was already taken. A pulse means "some tracked
    /// directory changed"; the receiver is expected to follow up with
    /// [`delta`](Self::delta).
    pub fn take_pulse_receiver(&mut self) -> Option<mpsc::Receiver<()>> {
        self.pulse_rx.take()
    }

    /// Reconcile the runner's current suite list against tracked state.
    ///
    /// In order:
    /// 1. sweep every tracked directory for fingerprint changes;
    /// 2. partition known suites into still-provided and removed, counting
    ///    changed dependencies of the still-provided ones inside a registry
    ///    usage window;
    /// 3. prune directories no surviving suite touched;
    /// 4. drop removed suites and construct collaborators for new ones.
    ///
    /// Construction failures land in the returned [`SuiteErrors`] without
    /// aborting the pass; a failed suite is retried on the next call.
    pub fn delta(&mut self, specs: &[SuiteSpec]) -> (Delta, SuiteErrors) {
        let mut delta = Delta::default();
        let mut errors = SuiteErrors::new();

        delta.modified_packages = self.registry.check_for_changes();

        let provided: HashSet<&PathBuf> = specs.iter().map(|spec| &spec.path).collect();

        self.registry.start_tracking_usage();

        let mut modified: Vec<(usize, PathBuf)> = Vec::new();
        let mut removed: Vec<PathBuf> = Vec::new();
        for (path, suite) in &self.suites {
            if provided.contains(path) {
                let count = suite.changed_dependency_count();
                if count > 0 {
                    modified.push((count, path.clone()));
                }
            } else {
                removed.push(path.clone());
            }
        }

        self.registry.stop_tracking_usage_and_prune();

        for path in &removed {
            self.suites.remove(path);
        }

        for spec in specs {
            if self.suites.contains_key(&spec.path) {
                continue;
            }
            match self
                .factory
                .construct(spec, self.config.max_depth, &self.registry)
            {
                Ok(suite) => {
                    self.suites.insert(spec.path.clone(), suite);
                    delta.new_suites.push(spec.path.clone());
                }
                Err(err) => {
                    warn!(suite = %spec.path.display(), error = %err, "could not construct suite");
                    errors.insert(spec.path.clone(), SuitewatchError::Other(err));
                }
            }
        }

        modified.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        delta.modified_suites = modified.into_iter().map(|(_, path)| path).collect();
        removed.sort();
        delta.removed_suites = removed;

        debug!(
            modified_packages = delta.modified_packages.len(),
            new = delta.new_suites.len(),
            modified = delta.modified_suites.len(),
            removed = delta.removed_suites.len(),
            "reconciliation pass complete"
        );

        (delta, errors)
    }

    /// Record that `spec` is about to run: reset its change baseline and
    /// re-resolve its dependency set.
    ///
    /// Suites the engine does not track (never constructed, or removed by an
    /// earlier pass) are an error.
    pub fn will_run(&mut self, spec: &SuiteSpec) -> Result<()> {
        let suite = self
            .suites
            .get_mut(&spec.path)
            .ok_or_else(|| SuitewatchError::UnknownSuite(spec.path.clone()))?;
        suite
            .mark_as_run_and_recompute(self.config.max_depth)
            .map_err(SuitewatchError::from)
    }
}
