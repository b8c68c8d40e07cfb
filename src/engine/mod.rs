// src/engine/mod.rs

//! Orchestration layer for incremental suite re-runs.
//!
//! This module ties together:
//! - the fingerprint registry (what changed on disk, and when)
//! - the suite collaborators (which directories each suite depends on)
//! - the reconciliation pass that turns both into a [`Delta`]: which suites
//!   are new, which need a re-run, which disappeared.
//!
//! The reconciliation logic lives in [`delta`]; the shared building blocks
//! are defined here.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::errors::SuitewatchError;

/// Result of one reconciliation pass.
///
/// All fields hold suite or directory paths exactly as the caller provided
/// them, except `modified_packages`, which holds the registry's absolute
/// directory keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Delta {
    /// Every tracked directory whose fingerprint moved during this pass,
    /// sorted. Useful for "what changed" reporting independent of suites.
    pub modified_packages: Vec<PathBuf>,

    /// Suites seen for the first time, in input order.
    pub new_suites: Vec<PathBuf>,

    /// Known suites with at least one changed dependency, most-affected
    /// first (descending changed-dependency count, ties by path).
    pub modified_suites: Vec<PathBuf>,

    /// Suites that were tracked but no longer appear in the input, sorted.
    pub removed_suites: Vec<PathBuf>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.modified_packages.is_empty()
            && self.new_suites.is_empty()
            && self.modified_suites.is_empty()
            && self.removed_suites.is_empty()
    }
}

/// Per-suite construction failures from one reconciliation pass, keyed by
/// suite path. One bad suite never aborts the pass.
pub type SuiteErrors = HashMap<PathBuf, SuitewatchError>;

pub mod delta;

pub use delta::DeltaEngine;
