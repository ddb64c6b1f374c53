//! Ledger events - the facts the command layer emits after persisting a
//! transaction, consumed by the propagator.
//!
//! Events are plain data so the channel between producer and consumer can be
//! swapped for any delivery fabric; no field depends on in-process state.
//! Delivery is assumed at-least-once with best-effort same-account ordering.

use crate::core::money::Money;
use crate::core::transaction::{Polarity, Transaction};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A transaction lifecycle fact awaiting propagation onto the owning
/// account and its monthly totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransactionCreated {
        transaction_id: String,
        user_id: String,
        account_id: String,
        polarity: Polarity,
        amount: Money,
        date: NaiveDate,
    },
    TransactionUpdated {
        transaction_id: String,
        user_id: String,
        account_id: String,
        polarity: Polarity,
        old_amount: Money,
        new_amount: Money,
        date: NaiveDate,
    },
    TransactionDeleted {
        transaction_id: String,
        user_id: String,
        account_id: String,
        polarity: Polarity,
        amount: Money,
        date: NaiveDate,
    },
}

impl LedgerEvent {
    /// Builds the creation fact for a just-persisted transaction.
    #[must_use]
    pub fn created(tx: &Transaction) -> Self {
        LedgerEvent::TransactionCreated {
            transaction_id: tx.id().to_string(),
            user_id: tx.user_id().to_string(),
            account_id: tx.account_id().to_string(),
            polarity: tx.polarity(),
            amount: tx.total_amount(),
            date: tx.transaction_date(),
        }
    }

    /// Builds the update fact; `old_amount` is the total before the edit.
    #[must_use]
    pub fn updated(tx: &Transaction, old_amount: Money) -> Self {
        LedgerEvent::TransactionUpdated {
            transaction_id: tx.id().to_string(),
            user_id: tx.user_id().to_string(),
            account_id: tx.account_id().to_string(),
            polarity: tx.polarity(),
            old_amount,
            new_amount: tx.total_amount(),
            date: tx.transaction_date(),
        }
    }

    /// Builds the deletion fact for a just-soft-deleted transaction.
    #[must_use]
    pub fn deleted(tx: &Transaction) -> Self {
        LedgerEvent::TransactionDeleted {
            transaction_id: tx.id().to_string(),
            user_id: tx.user_id().to_string(),
            account_id: tx.account_id().to_string(),
            polarity: tx.polarity(),
            amount: tx.total_amount(),
            date: tx.transaction_date(),
        }
    }

    #[must_use]
    pub fn transaction_id(&self) -> &str {
        match self {
            LedgerEvent::TransactionCreated { transaction_id, .. }
            | LedgerEvent::TransactionUpdated { transaction_id, .. }
            | LedgerEvent::TransactionDeleted { transaction_id, .. } => transaction_id,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            LedgerEvent::TransactionCreated { user_id, .. }
            | LedgerEvent::TransactionUpdated { user_id, .. }
            | LedgerEvent::TransactionDeleted { user_id, .. } => user_id,
        }
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        match self {
            LedgerEvent::TransactionCreated { account_id, .. }
            | LedgerEvent::TransactionUpdated { account_id, .. }
            | LedgerEvent::TransactionDeleted { account_id, .. } => account_id,
        }
    }

    #[must_use]
    pub fn polarity(&self) -> Polarity {
        match self {
            LedgerEvent::TransactionCreated { polarity, .. }
            | LedgerEvent::TransactionUpdated { polarity, .. }
            | LedgerEvent::TransactionDeleted { polarity, .. } => *polarity,
        }
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            LedgerEvent::TransactionCreated { date, .. }
            | LedgerEvent::TransactionUpdated { date, .. }
            | LedgerEvent::TransactionDeleted { date, .. } => *date,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionCreated { .. } => "transaction_created",
            LedgerEvent::TransactionUpdated { .. } => "transaction_updated",
            LedgerEvent::TransactionDeleted { .. } => "transaction_deleted",
        }
    }
}
