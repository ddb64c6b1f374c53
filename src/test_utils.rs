//! Shared test utilities.
//!
//! Provides the in-memory database setup plus factory helpers for accounts
//! and transactions with sensible defaults, so individual tests only spell
//! out what they actually care about.
#![allow(clippy::unwrap_used)]

use crate::config;
use crate::core::account::{Account, AccountDetail, AccountKind};
use crate::Money;
use crate::core::ident::new_object_id;
use crate::core::transaction::{NewItem, Transaction};
use crate::errors::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables and indexes
/// initialized. This is the standard setup for all repository tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    config::database::create_tables(&db).await?;
    Ok(db)
}

/// Parses a decimal literal into [`Money`], panicking on bad input.
pub fn money(raw: &str) -> Money {
    raw.parse().unwrap()
}

pub fn test_user_id() -> String {
    new_object_id()
}

pub fn test_account_id() -> String {
    new_object_id()
}

pub fn test_category_id() -> String {
    new_object_id()
}

/// A detail value for the given kind with plausible fixed parameters.
pub fn test_detail(kind: AccountKind) -> AccountDetail {
    let rate = Decimal::new(1995, 2); // 19.95
    match kind {
        AccountKind::Cash => AccountDetail::Cash,
        AccountKind::Checking => AccountDetail::Checking {
            overdraft_amount: money("100.00"),
        },
        AccountKind::Savings => AccountDetail::Savings {
            interest_rate: Decimal::new(45, 1), // 4.5
        },
        AccountKind::CreditCard => AccountDetail::CreditCard {
            credit_limit: money("1000.00"),
            interest_rate: rate,
        },
        AccountKind::LineOfCredit => AccountDetail::LineOfCredit {
            credit_limit: money("5000.00"),
            interest_rate: rate,
        },
        AccountKind::Loan => AccountDetail::Loan {
            credit_limit: money("20000.00"),
            interest_rate: rate,
        },
    }
}

/// A freshly minted account of the given kind with a zero balance.
pub fn test_account(kind: AccountKind) -> Account {
    Account::new(
        test_user_id(),
        format!("Test {}", kind.as_str()),
        test_detail(kind),
        "#3366cc".to_string(),
        false,
        0,
    )
    .unwrap()
}

/// A deposit against a freshly minted user and account pair.
pub fn test_deposit(amount: &str, date: NaiveDate) -> Transaction {
    Transaction::new_deposit(
        test_user_id(),
        test_account_id(),
        "Test Payee",
        money(amount),
        "test deposit",
        vec![],
        date,
    )
    .unwrap()
}

/// A purchase with one item per listed amount, against fresh ids.
pub fn test_purchase(amounts: &[&str], date: NaiveDate) -> Transaction {
    new_purchase(test_user_id(), test_account_id(), amounts, date)
}

/// A deposit tied to the given account's user and id.
pub fn test_deposit_for(account: &Account, amount: &str, date: NaiveDate) -> Transaction {
    Transaction::new_deposit(
        account.user_id(),
        account.id(),
        "Test Payee",
        money(amount),
        "test deposit",
        vec![],
        date,
    )
    .unwrap()
}

/// A purchase tied to the given account's user and id.
pub fn test_purchase_for(account: &Account, amounts: &[&str], date: NaiveDate) -> Transaction {
    new_purchase(
        account.user_id().to_string(),
        account.id().to_string(),
        amounts,
        date,
    )
}

fn new_purchase(
    user_id: impl Into<String>,
    account_id: impl Into<String>,
    amounts: &[&str],
    date: NaiveDate,
) -> Transaction {
    let items = amounts
        .iter()
        .map(|raw| NewItem {
            amount: money(raw),
            category_id: test_category_id(),
            description: "test item".to_string(),
        })
        .collect();
    Transaction::new_purchase(user_id, account_id, items, "test purchase", vec![], date).unwrap()
}
