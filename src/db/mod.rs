//! Repository modules - persistence collaborators for the domain models.
//!
//! Each module maps between stored rows and domain values and exposes the
//! narrow contract the engine consumes: get by id, list by filter, add,
//! update. Monetary columns travel as canonical decimal strings.

pub mod accounts;
pub mod monthly_totals;
pub mod transactions;

use crate::core::money::Money;
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

pub use accounts::{get_account, insert_account, list_accounts, update_account};
pub use monthly_totals::{get_by_key, insert_monthly_total, update_monthly_total};
pub use transactions::{
    TransactionFilter, get_transaction, insert_transaction, list_transactions,
    update_transaction,
};

pub(crate) fn parse_money(id: &str, field: &str, raw: &str) -> Result<Money> {
    Money::from_str(raw).map_err(|e| Error::CorruptRecord {
        id: id.to_string(),
        message: format!("{field} is not a decimal amount ({raw:?}): {e}"),
    })
}

pub(crate) fn parse_decimal(id: &str, field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| Error::CorruptRecord {
        id: id.to_string(),
        message: format!("{field} is not a decimal ({raw:?}): {e}"),
    })
}
