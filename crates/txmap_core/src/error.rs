//! Error types for txmap core.

use std::fmt::Debug;
use thiserror::Error;
use txmap_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in overlay operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A lifecycle operation needs an active transaction and the calling
    /// thread has none.
    #[error("cannot {operation}: no active transaction is associated with this thread")]
    NoActiveTransaction {
        /// The lifecycle operation that was attempted.
        operation: &'static str,
    },

    /// A lifecycle operation needs the calling thread to have no active
    /// transaction, but one is associated.
    #[error("cannot {operation}: another transaction is already active on this thread")]
    TransactionAlreadyActive {
        /// The lifecycle operation that was attempted.
        operation: &'static str,
    },

    /// The token belongs to a transaction parked in the suspended registry.
    #[error("transaction {token} is already associated with this map in suspended state")]
    AlreadySuspended {
        /// Debug rendering of the token.
        token: String,
    },

    /// The token is not in the suspended registry.
    #[error("no suspended transaction is associated with token {token}")]
    NotSuspended {
        /// Debug rendering of the token.
        token: String,
    },

    /// The token belongs to a transaction active on another thread.
    #[error("transaction {token} is already active on another thread")]
    TokenInUse {
        /// Debug rendering of the token.
        token: String,
    },

    /// The backing map failed. During commit this leaves the store in a
    /// partially applied state.
    #[error("backing map error: {0}")]
    Storage(#[from] StorageError),
}

impl CoreError {
    /// Creates a missing active transaction error.
    pub fn no_active_transaction(operation: &'static str) -> Self {
        Self::NoActiveTransaction { operation }
    }

    /// Creates an already active transaction error.
    pub fn transaction_already_active(operation: &'static str) -> Self {
        Self::TransactionAlreadyActive { operation }
    }

    /// Creates an already suspended error.
    pub fn already_suspended(token: &impl Debug) -> Self {
        Self::AlreadySuspended {
            token: format!("{token:?}"),
        }
    }

    /// Creates a not suspended error.
    pub fn not_suspended(token: &impl Debug) -> Self {
        Self::NotSuspended {
            token: format!("{token:?}"),
        }
    }

    /// Creates a token in use error.
    pub fn token_in_use(token: &impl Debug) -> Self {
        Self::TokenInUse {
            token: format!("{token:?}"),
        }
    }

    /// Returns true if the error reports a misuse of the transaction
    /// lifecycle rather than a backing map failure.
    #[must_use]
    pub fn is_lifecycle_violation(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_are_classified() {
        assert!(CoreError::no_active_transaction("commit").is_lifecycle_violation());
        assert!(CoreError::transaction_already_active("start").is_lifecycle_violation());
        assert!(CoreError::already_suspended(&1).is_lifecycle_violation());
        assert!(CoreError::not_suspended(&"tx").is_lifecycle_violation());
        assert!(CoreError::token_in_use(&7u8).is_lifecycle_violation());
        assert!(!CoreError::from(StorageError::backend("boom")).is_lifecycle_violation());
    }

    #[test]
    fn messages_name_operation_and_token() {
        let err = CoreError::no_active_transaction("rollback");
        assert!(err.to_string().contains("rollback"));

        let err = CoreError::not_suspended(&"tx-42");
        assert!(err.to_string().contains("\"tx-42\""));
    }
}
