//! Monthly total aggregate - per-(user, entity, kind, year, month) rolling
//! sums of credit and debit activity.
//!
//! Rows are keyed by their natural tuple; the repository upserts by that key
//! so repeated contributions merge into one row instead of duplicating. The
//! aggregate itself carries no deduplication memory - the propagator is
//! responsible for contributing each transaction event exactly once.

use crate::core::ident;
use crate::core::money::Money;
use crate::core::transaction::Polarity;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

/// Which entity stream a monthly total row belongs to. The key space is
/// shared but rows are disjoint by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Category,
    Merchant,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Category => "category",
            EntityKind::Merchant => "merchant",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "account" => Ok(EntityKind::Account),
            "category" => Ok(EntityKind::Category),
            "merchant" => Ok(EntityKind::Merchant),
            other => Err(Error::validation(format!("unknown entity kind {other:?}"))),
        }
    }
}

/// Natural key of a monthly total row. Two rows sharing this tuple are a bug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonthlyTotalKey {
    pub user_id: String,
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub year: i32,
    pub month: u32,
}

impl MonthlyTotalKey {
    pub fn new(
        user_id: impl Into<String>,
        entity_id: impl Into<String>,
        entity_kind: EntityKind,
        year: i32,
        month: u32,
    ) -> Result<Self> {
        let user_id = user_id.into();
        let entity_id = entity_id.into();
        ident::ensure_object_id("user_id", &user_id)?;
        ident::ensure_object_id("entity_id", &entity_id)?;
        if !(1..=12).contains(&month) {
            return Err(Error::validation(format!(
                "month must be within 1..=12, got {month}"
            )));
        }
        Ok(MonthlyTotalKey {
            user_id,
            entity_id,
            entity_kind,
            year,
            month,
        })
    }
}

/// Raw field set for reconstructing a [`MonthlyTotal`] from storage.
#[derive(Debug, Clone)]
pub struct MonthlyTotalRecord {
    pub id: String,
    pub key: MonthlyTotalKey,
    pub credit_total_amount: Money,
    pub credit_count: i32,
    pub debit_total_amount: Money,
    pub debit_count: i32,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Rolling credit/debit counts and sums for one key tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    id: String,
    key: MonthlyTotalKey,
    credit_total_amount: Money,
    credit_count: i32,
    debit_total_amount: Money,
    debit_count: i32,
    date_created: DateTime<Utc>,
    date_updated: DateTime<Utc>,
}

impl MonthlyTotal {
    /// Creates a zeroed row for a key tuple, the shape used on the first
    /// contribution for that tuple.
    #[must_use]
    pub fn new(key: MonthlyTotalKey) -> Self {
        let now = Utc::now();
        MonthlyTotal {
            id: ident::new_object_id(),
            key,
            credit_total_amount: Money::ZERO,
            credit_count: 0,
            debit_total_amount: Money::ZERO,
            debit_count: 0,
            date_created: now,
            date_updated: now,
        }
    }

    /// Reconstructs a row from storage.
    #[must_use]
    pub fn load(record: MonthlyTotalRecord) -> Self {
        MonthlyTotal {
            id: record.id,
            key: record.key,
            credit_total_amount: record.credit_total_amount,
            credit_count: record.credit_count,
            debit_total_amount: record.debit_total_amount,
            debit_count: record.debit_count,
            date_created: record.date_created,
            date_updated: record.date_updated,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn key(&self) -> &MonthlyTotalKey {
        &self.key
    }

    #[must_use]
    pub fn credit_total_amount(&self) -> Money {
        self.credit_total_amount
    }

    #[must_use]
    pub fn credit_count(&self) -> i32 {
        self.credit_count
    }

    #[must_use]
    pub fn debit_total_amount(&self) -> Money {
        self.debit_total_amount
    }

    #[must_use]
    pub fn debit_count(&self) -> i32 {
        self.debit_count
    }

    #[must_use]
    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    #[must_use]
    pub fn date_updated(&self) -> DateTime<Utc> {
        self.date_updated
    }

    /// Pure in-memory contribution: bumps exactly one (count, sum) pair.
    pub fn contribute(&mut self, polarity: Polarity, amount: Money) -> Result<()> {
        if amount.is_negative() {
            return Err(Error::InvalidAmount {
                amount: amount.amount(),
            });
        }
        match polarity {
            Polarity::Credit => {
                self.credit_count += 1;
                self.credit_total_amount += amount;
            }
            Polarity::Debit => {
                self.debit_count += 1;
                self.debit_total_amount += amount;
            }
        }
        self.date_updated = Utc::now();
        Ok(())
    }

    /// Reversal hook: undoes one prior contribution. Whether deletions call
    /// this is a propagator policy choice, not a rule of the aggregate.
    /// Retractions that outrun recorded history clamp at zero with a warning
    /// rather than driving the row negative.
    pub fn retract(&mut self, polarity: Polarity, amount: Money) -> Result<()> {
        if amount.is_negative() {
            return Err(Error::InvalidAmount {
                amount: amount.amount(),
            });
        }
        let (count, total) = match polarity {
            Polarity::Credit => (&mut self.credit_count, &mut self.credit_total_amount),
            Polarity::Debit => (&mut self.debit_count, &mut self.debit_total_amount),
        };
        if *count == 0 || *total < amount {
            warn!(
                monthly_total_id = %self.id,
                polarity = polarity.as_str(),
                %amount,
                "retraction exceeds recorded history; clamping at zero"
            );
            *count = (*count - 1).max(0);
            *total = if *total < amount { Money::ZERO } else { *total - amount };
        } else {
            *count -= 1;
            *total -= amount;
        }
        self.date_updated = Utc::now();
        Ok(())
    }
}
