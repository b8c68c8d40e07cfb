// src/watch/mod.rs

//! Directory watching and change detection.
//!
//! This module is responsible for:
//! - Fingerprinting single directories by file metadata digests.
//! - Keeping all fingerprints in one lock-guarded, path-keyed registry with
//!   mark-and-sweep pruning of directories no suite uses anymore.
//! - (Optionally) wiring every tracked directory to the platform's native
//!   file notifications and merging the resulting pulses into one stream.
//!
//! It does **not** know what a test suite is or how dependencies are
//! resolved; it only answers "did this directory change, and when".

pub mod fingerprint;
pub mod mux;
pub mod registry;
pub mod watcher;

pub use fingerprint::{DirectoryFingerprint, FingerprintSnapshot};
pub use mux::ChangeMultiplexer;
pub use registry::FingerprintRegistry;
