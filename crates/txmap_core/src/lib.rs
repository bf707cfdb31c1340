//! # txmap core
//!
//! Read-committed transactions over a single in-memory key-value map.
//!
//! This crate provides:
//! - [`Overlay`], a map facade whose callers can start, suspend, resume,
//!   commit and roll back transactions identified by caller-chosen tokens
//! - [`TransactionState`] to ask where a token stands on an overlay
//! - [`OverlayConfig`] to choose between minimal-apply and full-replay commits
//!
//! ## Isolation
//!
//! - A transaction reads its own writes
//! - Nobody else observes them before commit
//! - A commit is applied under one exclusive lock acquisition, so concurrent
//!   readers see either all or none of it
//!
//! Reads inside a transaction are not repeatable: keys the transaction has
//! not touched are read from the latest committed state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod overlay;
mod stats;
mod transaction;

pub use config::OverlayConfig;
pub use error::{CoreError, CoreResult};
pub use overlay::Overlay;
pub use stats::{OverlayStats, StatsSnapshot};
pub use transaction::TransactionState;
pub use txmap_storage::{LockStats, LockedStore, MapBackend, StorageError, StorageResult};
