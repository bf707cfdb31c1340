//! Per-transaction buffering, the per-thread registry and lifecycle state.
//!
//! A [`TxBuffer`] stages the puts, removes and clear of one transaction and
//! serves reads by merging them over the committed store. Nothing reaches the
//! backing map until the buffer is committed, which replays its effects under
//! a single exclusive lock acquisition.

//! The [`TxRegistry`] holds the buffer active on each thread. A thread that
//! exits with a transaction still active has it rolled back by a thread-local
//! exit hook, so its token becomes free again.

mod buffer;
mod registry;
mod state;

pub(crate) use buffer::TxBuffer;
pub(crate) use registry::TxRegistry;
pub use state::TransactionState;
