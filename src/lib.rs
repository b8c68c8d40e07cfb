// src/lib.rs

//! Incremental change detection for test-suite runners.
//!
//! `suitewatch` answers one question between runs of a watch loop: given the
//! suites the runner currently sees, what needs to happen? Directories are
//! fingerprinted by cheap metadata digests, suites declare which directories
//! they depend on, and a reconciliation pass turns the two into a
//! [`Delta`]: new suites, suites whose dependencies changed, suites that
//! disappeared.
//!
//! The usual flow is:
//! 1. build a [`DeltaEngine`] from a [`WatchConfig`] and a
//!    [`SuiteFactory`](suite::SuiteFactory),
//! 2. call [`DeltaEngine::delta`] with the current suite list whenever the
//!    runner wants to know what changed (on a timer, or on a pulse from
//!    [`DeltaEngine::take_pulse_receiver`] when native notifications are
//!    enabled),
//! 3. call [`DeltaEngine::will_run`] for each suite just before running it.

pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod suite;
pub mod watch;

pub use config::WatchConfig;
pub use engine::{Delta, DeltaEngine, SuiteErrors};
pub use errors::{Result, SuitewatchError};
pub use suite::{Suite, SuiteFactory, SuiteSpec};
pub use watch::{FingerprintRegistry, FingerprintSnapshot};
