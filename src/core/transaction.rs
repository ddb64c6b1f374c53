//! Transaction model - a single financial event against an account.
//!
//! A transaction owns its line items and payments and derives its totals
//! from them; nothing is stored that could drift out of sync. Deposits are
//! credit-polarity single-amount events; purchases are debit-polarity and
//! carry one or more items plus zero or more payments against the owing
//! remainder. Overpayments are clipped to the remaining owing amount and the
//! unapplied remainder is handed back to the caller, never silently kept.

use crate::core::ident;
use crate::core::money::Money;
use crate::errors::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Transaction-level classification: money in (credit) or money out (debit),
/// independent of how any particular account's balance moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Credit,
    Debit,
}

impl Polarity {
    #[must_use]
    pub fn is_credit(self) -> bool {
        matches!(self, Polarity::Credit)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Credit => "credit",
            Polarity::Debit => "debit",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "credit" => Ok(Polarity::Credit),
            "debit" => Ok(Polarity::Debit),
            other => Err(Error::validation(format!("unknown polarity {other:?}"))),
        }
    }
}

/// Derived lifecycle status; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Built in memory, not yet persisted.
    New,
    /// Persisted and live.
    Active,
    /// A purchase whose owing remainder has reached zero.
    Paid,
    /// Soft-deleted.
    Deleted,
}

/// A single purchase line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub id: String,
    pub amount: Money,
    pub category_id: String,
    pub description: String,
}

/// A payment made against a purchase's owing remainder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayment {
    pub id: String,
    pub amount: Money,
    pub payment_date: NaiveDate,
}

/// Variant-specific transaction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetail {
    Deposit {
        payee: String,
        amount: Money,
    },
    Purchase {
        items: Vec<TransactionItem>,
        payments: Vec<TransactionPayment>,
    },
}

impl TransactionDetail {
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            TransactionDetail::Deposit { .. } => "deposit",
            TransactionDetail::Purchase { .. } => "purchase",
        }
    }
}

/// Input for a purchase line item at construction time.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub amount: Money,
    pub category_id: String,
    pub description: String,
}

/// Raw field set for reconstructing a [`Transaction`] from storage.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub description: String,
    pub tags: Vec<String>,
    pub transaction_date: NaiveDate,
    pub detail: TransactionDetail,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub date_deleted: Option<DateTime<Utc>>,
}

/// A single financial event moving money through an account.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: String,
    user_id: String,
    account_id: String,
    description: String,
    tags: Vec<String>,
    transaction_date: NaiveDate,
    detail: TransactionDetail,
    is_new: bool,
    date_created: DateTime<Utc>,
    date_updated: DateTime<Utc>,
    date_deleted: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Creates a deposit: a credit of a single amount from a payee.
    pub fn new_deposit(
        user_id: impl Into<String>,
        account_id: impl Into<String>,
        payee: impl Into<String>,
        amount: Money,
        description: impl Into<String>,
        tags: Vec<String>,
        transaction_date: NaiveDate,
    ) -> Result<Self> {
        ensure_amount(amount)?;
        let detail = TransactionDetail::Deposit {
            payee: payee.into(),
            amount,
        };
        Self::new_inner(user_id, account_id, description, tags, transaction_date, detail)
    }

    /// Creates a purchase from one or more line items.
    pub fn new_purchase(
        user_id: impl Into<String>,
        account_id: impl Into<String>,
        items: Vec<NewItem>,
        description: impl Into<String>,
        tags: Vec<String>,
        transaction_date: NaiveDate,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::validation("a purchase requires at least one item"));
        }
        let detail = TransactionDetail::Purchase {
            items: Vec::new(),
            payments: Vec::new(),
        };
        let mut transaction =
            Self::new_inner(user_id, account_id, description, tags, transaction_date, detail)?;
        for item in items {
            transaction.add_item(item.amount, item.category_id, item.description)?;
        }
        Ok(transaction)
    }

    fn new_inner(
        user_id: impl Into<String>,
        account_id: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
        transaction_date: NaiveDate,
        detail: TransactionDetail,
    ) -> Result<Self> {
        let user_id = user_id.into();
        let account_id = account_id.into();
        ident::ensure_object_id("user_id", &user_id)?;
        ident::ensure_object_id("account_id", &account_id)?;

        let now = Utc::now();
        Ok(Transaction {
            id: ident::new_object_id(),
            user_id,
            account_id,
            description: description.into(),
            tags,
            transaction_date,
            detail,
            is_new: true,
            date_created: now,
            date_updated: now,
            date_deleted: None,
        })
    }

    /// Reconstructs a transaction from storage, accepting timestamps as given.
    #[must_use]
    pub fn load(record: TransactionRecord) -> Self {
        Transaction {
            id: record.id,
            user_id: record.user_id,
            account_id: record.account_id,
            description: record.description,
            tags: record.tags,
            transaction_date: record.transaction_date,
            detail: record.detail,
            is_new: false,
            date_created: record.date_created,
            date_updated: record.date_updated,
            date_deleted: record.date_deleted,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn transaction_date(&self) -> NaiveDate {
        self.transaction_date
    }

    #[must_use]
    pub fn detail(&self) -> &TransactionDetail {
        &self.detail
    }

    #[must_use]
    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    #[must_use]
    pub fn date_updated(&self) -> DateTime<Utc> {
        self.date_updated
    }

    #[must_use]
    pub fn date_deleted(&self) -> Option<DateTime<Utc>> {
        self.date_deleted
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.date_deleted.is_some()
    }

    /// Fixed per-variant classification.
    #[must_use]
    pub fn polarity(&self) -> Polarity {
        match self.detail {
            TransactionDetail::Deposit { .. } => Polarity::Credit,
            TransactionDetail::Purchase { .. } => Polarity::Debit,
        }
    }

    /// Deposit amount, or the sum of purchase item amounts.
    #[must_use]
    pub fn total_amount(&self) -> Money {
        match &self.detail {
            TransactionDetail::Deposit { amount, .. } => *amount,
            TransactionDetail::Purchase { items, .. } => {
                items.iter().map(|item| item.amount).sum()
            }
        }
    }

    /// Sum of payments; zero for deposits.
    #[must_use]
    pub fn total_paid(&self) -> Money {
        match &self.detail {
            TransactionDetail::Deposit { .. } => Money::ZERO,
            TransactionDetail::Purchase { payments, .. } => {
                payments.iter().map(|payment| payment.amount).sum()
            }
        }
    }

    /// Unpaid remainder. Payment clipping keeps this from going negative.
    #[must_use]
    pub fn total_owing(&self) -> Money {
        self.total_amount() - self.total_paid()
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        if self.is_deleted() {
            return TransactionStatus::Deleted;
        }
        if self.is_new {
            return TransactionStatus::New;
        }
        match &self.detail {
            TransactionDetail::Purchase { items, .. }
                if !items.is_empty() && self.total_owing().is_zero() =>
            {
                TransactionStatus::Paid
            }
            _ => TransactionStatus::Active,
        }
    }

    /// Appends a line item to a purchase.
    pub fn add_item(
        &mut self,
        amount: Money,
        category_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<()> {
        ensure_amount(amount)?;
        self.ensure_live()?;
        let category_id = category_id.into();
        ident::ensure_object_id("category_id", &category_id)?;

        match &mut self.detail {
            TransactionDetail::Purchase { items, .. } => {
                items.push(TransactionItem {
                    id: ident::new_object_id(),
                    amount,
                    category_id,
                    description: description.into(),
                });
                self.touch();
                Ok(())
            }
            TransactionDetail::Deposit { .. } => Err(Error::invalid_operation(
                "items only apply to purchase transactions",
            )),
        }
    }

    /// Records a payment against the owing remainder. The applied portion is
    /// clipped to what is still owed; the unapplied remainder is returned to
    /// the caller. With nothing owing, the whole amount comes back.
    pub fn add_payment(&mut self, amount: Money, payment_date: NaiveDate) -> Result<Money> {
        ensure_amount(amount)?;
        self.ensure_live()?;

        let owing = self.total_owing();
        match &mut self.detail {
            TransactionDetail::Purchase { payments, .. } => {
                let applied = if amount > owing { owing } else { amount };
                let remainder = amount - applied;
                if !applied.is_zero() {
                    payments.push(TransactionPayment {
                        id: ident::new_object_id(),
                        amount: applied,
                        payment_date,
                    });
                    self.touch();
                }
                Ok(remainder)
            }
            TransactionDetail::Deposit { .. } => Err(Error::invalid_operation(
                "payments only apply to purchase transactions",
            )),
        }
    }

    /// Replaces a deposit's amount, returning the previous one.
    pub fn set_deposit_amount(&mut self, new_amount: Money) -> Result<Money> {
        ensure_amount(new_amount)?;
        self.ensure_live()?;
        match &mut self.detail {
            TransactionDetail::Deposit { amount, .. } => {
                let old = *amount;
                *amount = new_amount;
                self.touch();
                Ok(old)
            }
            TransactionDetail::Purchase { .. } => Err(Error::invalid_operation(
                "only deposits carry a single adjustable amount",
            )),
        }
    }

    /// Soft-marks the transaction deleted. Rows are never physically removed.
    pub fn delete(&mut self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::invalid_operation(format!(
                "transaction {} is already deleted",
                self.id
            )));
        }
        self.date_deleted = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Clears the transient flag after the repository has stored the row.
    pub fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::invalid_operation(format!(
                "transaction {} is deleted",
                self.id
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.date_updated = Utc::now();
    }
}

fn ensure_amount(amount: Money) -> Result<()> {
    if amount.is_negative() {
        return Err(Error::InvalidAmount {
            amount: amount.amount(),
        });
    }
    Ok(())
}
