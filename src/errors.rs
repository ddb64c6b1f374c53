//! Unified error types and result handling for `BalanceBook`.
//!
//! Validation and invalid-operation errors are fatal to the operation that
//! raised them and are never retried. Not-found errors are fatal for the
//! event being processed. Database errors may be transient; the propagator
//! applies bounded retry at the persistence steps only.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required field was missing or malformed at construction time.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A monetary amount outside the accepted range (negative, for every
    /// balance-moving operation in this crate).
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    /// The operation is not defined for the entity's current state or kind
    /// (mutating a deleted account, closing a cash account, ...).
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("account {account_id} not found for user {user_id}")]
    AccountNotFound {
        user_id: String,
        account_id: String,
    },

    #[error("transaction {transaction_id} not found for user {user_id}")]
    TransactionNotFound {
        user_id: String,
        transaction_id: String,
    },

    /// Optimistic-concurrency check failed: the row was modified since it
    /// was loaded. Callers reload and reapply.
    #[error("stale revision {revision} for account {account_id}")]
    RevisionConflict { account_id: String, revision: i64 },

    #[error("configuration error: {message}")]
    Config { message: String },

    /// The propagation channel is gone; emitted facts have nowhere to go.
    #[error("event channel closed")]
    ChannelClosed,

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt record {id}: {message}")]
    CorruptRecord { id: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Whether a failed persistence call is worth retrying. Validation,
    /// not-found and state errors will fail identically on every attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Io(_))
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
