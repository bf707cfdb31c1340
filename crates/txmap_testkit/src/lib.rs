//! # txmap testkit
//!
//! Test utilities for txmap.
//!
//! This crate provides:
//! - Backing maps that record ([`RecordingMap`]) or fail ([`FailingMap`])
//!   their mutation calls
//! - Overlay fixtures and a `tracing` setup for tests
//! - Property-based test generators and a reference model using proptest
//! - Concurrency stress harnesses
//!
//! ## Usage
//!
//! ```rust
//! use txmap_testkit::prelude::*;
//! use txmap_core::OverlayConfig;
//!
//! let (overlay, log) = recording_overlay(&[("a", "1")], OverlayConfig::default());
//! overlay.start_transaction(1).unwrap();
//! overlay.remove(&"a".to_string()).unwrap();
//! assert!(log.is_empty());
//! overlay.commit_transaction().unwrap();
//! assert_eq!(log.pop_call(), Some(MapCall::Remove { key: "a".to_string() }));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
pub use stress::*;
