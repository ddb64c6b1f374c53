//! Account model - the closed set of account kinds and their balance rules.
//!
//! Every kind carries a fixed polarity: asset-style accounts (cash, checking,
//! savings) grow when a credit transaction lands on them, while liability
//! accounts (credit card, line of credit, loan) track an owed amount that
//! shrinks on a credit (a payment) and grows on a debit (a purchase). The
//! balance field is private; the only legal mutations are [`Account::apply`]
//! and [`Account::reverse`], which are exact algebraic inverses of each other
//! for the same (amount, polarity) pair.

use crate::core::ident;
use crate::core::money::Money;
use crate::core::transaction::Polarity;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum accepted length for an account name.
pub const MAX_NAME_LEN: usize = 50;

/// The closed set of account kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Cash,
    Checking,
    Savings,
    CreditCard,
    LineOfCredit,
    Loan,
}

impl AccountKind {
    pub const ALL: [AccountKind; 6] = [
        AccountKind::Cash,
        AccountKind::Checking,
        AccountKind::Savings,
        AccountKind::CreditCard,
        AccountKind::LineOfCredit,
        AccountKind::Loan,
    ];

    /// Fixed balance polarity: `true` for kinds whose balance is an owed
    /// amount rather than an asset.
    #[must_use]
    pub fn is_credit(self) -> bool {
        matches!(
            self,
            AccountKind::CreditCard | AccountKind::LineOfCredit | AccountKind::Loan
        )
    }

    /// Only the seeded cash account is protected from deletion.
    #[must_use]
    pub fn can_be_deleted(self) -> bool {
        !matches!(self, AccountKind::Cash)
    }

    /// Closing only makes sense for borrowing-style accounts.
    #[must_use]
    pub fn supports_closing(self) -> bool {
        self.is_credit()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Cash => "cash",
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::CreditCard => "credit_card",
            AccountKind::LineOfCredit => "line_of_credit",
            AccountKind::Loan => "loan",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "cash" => Ok(AccountKind::Cash),
            "checking" => Ok(AccountKind::Checking),
            "savings" => Ok(AccountKind::Savings),
            "credit_card" => Ok(AccountKind::CreditCard),
            "line_of_credit" => Ok(AccountKind::LineOfCredit),
            "loan" => Ok(AccountKind::Loan),
            other => Err(Error::validation(format!("unknown account kind {other:?}"))),
        }
    }
}

/// Kind-specific account fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountDetail {
    Cash,
    Checking { overdraft_amount: Money },
    Savings { interest_rate: Decimal },
    CreditCard { credit_limit: Money, interest_rate: Decimal },
    LineOfCredit { credit_limit: Money, interest_rate: Decimal },
    Loan { credit_limit: Money, interest_rate: Decimal },
}

impl AccountDetail {
    #[must_use]
    pub fn kind(&self) -> AccountKind {
        match self {
            AccountDetail::Cash => AccountKind::Cash,
            AccountDetail::Checking { .. } => AccountKind::Checking,
            AccountDetail::Savings { .. } => AccountKind::Savings,
            AccountDetail::CreditCard { .. } => AccountKind::CreditCard,
            AccountDetail::LineOfCredit { .. } => AccountKind::LineOfCredit,
            AccountDetail::Loan { .. } => AccountKind::Loan,
        }
    }

    #[must_use]
    pub fn credit_limit(&self) -> Option<Money> {
        match self {
            AccountDetail::CreditCard { credit_limit, .. }
            | AccountDetail::LineOfCredit { credit_limit, .. }
            | AccountDetail::Loan { credit_limit, .. } => Some(*credit_limit),
            _ => None,
        }
    }

    #[must_use]
    pub fn interest_rate(&self) -> Option<Decimal> {
        match self {
            AccountDetail::Savings { interest_rate }
            | AccountDetail::CreditCard { interest_rate, .. }
            | AccountDetail::LineOfCredit { interest_rate, .. }
            | AccountDetail::Loan { interest_rate, .. } => Some(*interest_rate),
            AccountDetail::Cash | AccountDetail::Checking { .. } => None,
        }
    }

    #[must_use]
    pub fn overdraft_amount(&self) -> Option<Money> {
        match self {
            AccountDetail::Checking { overdraft_amount } => Some(*overdraft_amount),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(limit) = self.credit_limit() {
            if limit.is_negative() {
                return Err(Error::InvalidAmount {
                    amount: limit.amount(),
                });
            }
        }
        if let Some(overdraft) = self.overdraft_amount() {
            if overdraft.is_negative() {
                return Err(Error::InvalidAmount {
                    amount: overdraft.amount(),
                });
            }
        }
        if let Some(rate) = self.interest_rate() {
            if rate.is_sign_negative() {
                return Err(Error::validation(format!(
                    "interest rate must not be negative, got {rate}"
                )));
            }
        }
        Ok(())
    }
}

/// Raw field set for reconstructing an [`Account`] from storage.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub balance: Money,
    pub display_color: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub sort_order: i32,
    pub revision: i64,
    pub detail: AccountDetail,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub date_closed: Option<DateTime<Utc>>,
    pub date_deleted: Option<DateTime<Utc>>,
}

/// A user's financial account.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    id: String,
    user_id: String,
    name: String,
    balance: Money,
    display_color: String,
    description: Option<String>,
    is_default: bool,
    sort_order: i32,
    revision: i64,
    detail: AccountDetail,
    date_created: DateTime<Utc>,
    date_updated: DateTime<Utc>,
    date_closed: Option<DateTime<Utc>>,
    date_deleted: Option<DateTime<Utc>>,
}

/// Optional field changes for [`Account::update_details`]. `None` leaves a
/// field untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_color: Option<String>,
    pub is_default: Option<bool>,
    pub sort_order: Option<i32>,
}

impl Account {
    /// Creates a new account with a zero balance and a freshly minted id.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        detail: AccountDetail,
        display_color: impl Into<String>,
        is_default: bool,
        sort_order: i32,
    ) -> Result<Self> {
        let user_id = user_id.into();
        let name = name.into();
        ident::ensure_object_id("user_id", &user_id)?;
        validate_name(&name)?;
        detail.validate()?;

        let now = Utc::now();
        Ok(Account {
            id: ident::new_object_id(),
            user_id,
            name,
            balance: Money::ZERO,
            display_color: display_color.into(),
            description: None,
            is_default,
            sort_order,
            revision: 0,
            detail,
            date_created: now,
            date_updated: now,
            date_closed: None,
            date_deleted: None,
        })
    }

    /// Reconstructs an account from storage, accepting all fields as given.
    #[must_use]
    pub fn load(record: AccountRecord) -> Self {
        Account {
            id: record.id,
            user_id: record.user_id,
            name: record.name,
            balance: record.balance,
            display_color: record.display_color,
            description: record.description,
            is_default: record.is_default,
            sort_order: record.sort_order,
            revision: record.revision,
            detail: record.detail,
            date_created: record.date_created,
            date_updated: record.date_updated,
            date_closed: record.date_closed,
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
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn balance(&self) -> Money {
        self.balance
    }

    #[must_use]
    pub fn display_color(&self) -> &str {
        &self.display_color
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    #[must_use]
    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    #[must_use]
    pub fn revision(&self) -> i64 {
        self.revision
    }

    #[must_use]
    pub fn detail(&self) -> &AccountDetail {
        &self.detail
    }

    #[must_use]
    pub fn kind(&self) -> AccountKind {
        self.detail.kind()
    }

    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.kind().is_credit()
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
    pub fn date_closed(&self) -> Option<DateTime<Utc>> {
        self.date_closed
    }

    #[must_use]
    pub fn date_deleted(&self) -> Option<DateTime<Utc>> {
        self.date_deleted
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.date_closed.is_some()
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.date_deleted.is_some()
    }

    /// Whether the owed balance has passed the credit limit. Always `false`
    /// for kinds without a limit.
    #[must_use]
    pub fn is_over_limit(&self) -> bool {
        self.detail
            .credit_limit()
            .is_some_and(|limit| self.balance > limit)
    }

    /// How much can still be drawn: balance plus overdraft for checking,
    /// remaining headroom under the limit for borrowing kinds, the plain
    /// balance otherwise.
    #[must_use]
    pub fn available_balance(&self) -> Money {
        match &self.detail {
            AccountDetail::Checking { overdraft_amount } => self.balance + *overdraft_amount,
            detail => match detail.credit_limit() {
                Some(limit) => limit - self.balance,
                None => self.balance,
            },
        }
    }

    /// Applies a transaction's effect to the balance.
    pub fn apply(&mut self, amount: Money, polarity: Polarity) -> Result<()> {
        let delta = self.signed_delta(amount, polarity)?;
        self.balance += delta;
        self.touch();
        Ok(())
    }

    /// Exact algebraic inverse of [`Account::apply`] for the same pair.
    pub fn reverse(&mut self, amount: Money, polarity: Polarity) -> Result<()> {
        let delta = self.signed_delta(amount, polarity)?;
        self.balance -= delta;
        self.touch();
        Ok(())
    }

    fn signed_delta(&self, amount: Money, polarity: Polarity) -> Result<Money> {
        if amount.is_negative() {
            return Err(Error::InvalidAmount {
                amount: amount.amount(),
            });
        }
        if self.is_deleted() {
            return Err(Error::invalid_operation(format!(
                "account {} is deleted and cannot move its balance",
                self.id
            )));
        }
        // XOR of transaction polarity and account polarity: a credit grows
        // an asset balance but shrinks an owed one, and vice versa.
        if polarity.is_credit() != self.is_credit() {
            Ok(amount)
        } else {
            Ok(-amount)
        }
    }

    /// Applies the non-`None` changes, stamping `date_updated` only when a
    /// field actually changed. Returns whether anything changed.
    pub fn update_details(&mut self, update: AccountUpdate) -> Result<bool> {
        if self.is_deleted() {
            return Err(Error::invalid_operation(format!(
                "account {} is deleted and cannot be updated",
                self.id
            )));
        }

        let mut changed = false;
        if let Some(name) = update.name {
            validate_name(&name)?;
            if name != self.name {
                self.name = name;
                changed = true;
            }
        }
        if let Some(description) = update.description {
            if self.description.as_deref() != Some(description.as_str()) {
                self.description = Some(description);
                changed = true;
            }
        }
        if let Some(display_color) = update.display_color {
            if display_color != self.display_color {
                self.display_color = display_color;
                changed = true;
            }
        }
        if let Some(is_default) = update.is_default {
            if is_default != self.is_default {
                self.is_default = is_default;
                changed = true;
            }
        }
        if let Some(sort_order) = update.sort_order {
            if sort_order != self.sort_order {
                self.sort_order = sort_order;
                changed = true;
            }
        }

        if changed {
            self.touch();
        }
        Ok(changed)
    }

    /// Closes a borrowing-style account.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_closable()?;
        if self.is_closed() {
            return Err(Error::invalid_operation(format!(
                "account {} is already closed",
                self.id
            )));
        }
        self.date_closed = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Reopens a previously closed account.
    pub fn reopen(&mut self) -> Result<()> {
        self.ensure_closable()?;
        if !self.is_closed() {
            return Err(Error::invalid_operation(format!(
                "account {} is not closed",
                self.id
            )));
        }
        self.date_closed = None;
        self.touch();
        Ok(())
    }

    /// Soft-deletes the account. Rows are never physically removed. The
    /// balance must be zero at the moment of deletion; checking it here,
    /// on the same loaded state the optimistic update will persist, keeps
    /// a concurrently landing transaction from being orphaned behind the
    /// deleted-account guard.
    pub fn mark_deleted(&mut self) -> Result<()> {
        if !self.kind().can_be_deleted() {
            return Err(Error::invalid_operation(format!(
                "{} accounts cannot be deleted",
                self.kind().as_str()
            )));
        }
        if self.is_deleted() {
            return Err(Error::invalid_operation(format!(
                "account {} is already deleted",
                self.id
            )));
        }
        if !self.balance.is_zero() {
            return Err(Error::invalid_operation(format!(
                "account {} still carries a balance of {}",
                self.id, self.balance
            )));
        }
        self.date_deleted = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Called by the repository after a successful optimistic update.
    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    fn ensure_closable(&self) -> Result<()> {
        if self.is_deleted() {
            return Err(Error::invalid_operation(format!(
                "account {} is deleted",
                self.id
            )));
        }
        if !self.kind().supports_closing() {
            return Err(Error::invalid_operation(format!(
                "{} accounts cannot be closed",
                self.kind().as_str()
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.date_updated = Utc::now();
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("account name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::validation(format!(
            "account name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}
