// src/watch/mod.rs

//! File watching and event routing.
//!
//! This module is responsible for:
//! - Resolving filesystem events to the repository whose torrent changed
//!   ([`router`]).
//! - Running one `notify` watcher and watch loop per repository
//!   ([`watcher`]).
//! - Fingerprinting torrent contents for `use_hash` ([`hash`]).
//!
//! It does **not** know how a redeploy works; it hands matching events to a
//! [`crate::reconcile::Reconcile`] implementation.

pub mod hash;
pub mod router;
pub mod watcher;

pub use router::{WatchBinding, WatchRouter};
pub use watcher::{FatalError, WatchOptions, WatcherGroup};
