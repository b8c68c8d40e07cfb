// src/suite.rs

//! Pluggable suite collaborator abstraction.
//!
//! The delta engine tracks which suites need a re-run, but it does not know
//! how a suite resolves its dependency directories. That knowledge lives
//! behind [`Suite`] and [`SuiteFactory`]:
//!
//! - the runner's real suite type walks local imports up to `max_depth`
//!   levels and registers every dependency directory with the shared
//!   [`FingerprintRegistry`];
//! - tests can provide a fake suite that reports scripted dependency sets
//!   without touching a compiler or module system.

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::Error;
use crate::watch::FingerprintRegistry;

/// Identity of one test suite as provided by the runner.
///
/// The path is the suite's root directory and doubles as its identity: the
/// engine keys all per-suite state by this path, verbatim. Callers must be
/// consistent about relative vs. absolute forms across calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuiteSpec {
    pub path: PathBuf,
}

impl SuiteSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// One tracked suite, as seen by the delta engine.
///
/// Production code resolves real dependency graphs; tests can provide an
/// implementation with scripted dependencies.
pub trait Suite: Send {
    /// How many of this suite's dependency directories changed since the
    /// suite last ran.
    ///
    /// Implementations read fingerprints through
    /// [`FingerprintRegistry::get`], which also marks each queried directory
    /// as in use for the registry's current usage window. Suites must query
    /// every dependency here, even once a nonzero count is known, so that
    /// none of their directories get pruned.
    fn changed_dependency_count(&self) -> usize;

    /// Record that the suite is about to run and re-resolve its dependency
    /// set, re-registering every directory it now depends on.
    fn mark_as_run_and_recompute(&mut self, max_depth: u32) -> Result<(), Error>;
}

/// Builds [`Suite`] values for paths the engine has not seen before.
pub trait SuiteFactory: Send {
    type Suite: Suite;

    /// Construct the collaborator for `spec`, registering its dependency
    /// directories (the suite's own directory included) with `registry`.
    fn construct(
        &self,
        spec: &SuiteSpec,
        max_depth: u32,
        registry: &Arc<FingerprintRegistry>,
    ) -> Result<Self::Suite, Error>;
}
