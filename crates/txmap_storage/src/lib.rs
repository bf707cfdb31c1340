//! # txmap storage
//!
//! Backing map contract and the reader-writer locked store the transactional
//! overlay is built on.
//!
//! ## Design Principles
//!
//! - Backends are plain key-value containers with no knowledge of transactions
//! - Every backend access goes through [`LockedStore`]'s lock
//! - A batch of writes is made visible atomically by holding one
//!   [`StoreWriteGuard`]
//! - Backends must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`std::collections::HashMap`] (any `BuildHasher`)
//! - [`std::collections::BTreeMap`]
//! - Anything else implementing [`MapBackend`]
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use txmap_storage::LockedStore;
//!
//! let store: LockedStore<String, u32> = LockedStore::new(HashMap::new());
//! store.put("a".to_string(), 1).unwrap();
//! {
//!     let mut batch = store.write();
//!     batch.remove(&"a".to_string()).unwrap();
//!     batch.put("b".to_string(), 2).unwrap();
//! }
//! assert_eq!(store.get(&"b".to_string()).unwrap(), Some(2));
//! assert_eq!(store.get(&"a".to_string()).unwrap(), None);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod locked;
mod memory;

pub use backend::MapBackend;
pub use error::{StorageError, StorageResult};
pub use locked::{LockStats, LockedStore, StoreReadGuard, StoreWriteGuard};
