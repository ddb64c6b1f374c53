//! Transactions repository - document-style row mapping for the aggregate.
//!
//! Tags, line items and payments serialize as JSON text on the row, so the
//! whole aggregate moves in one round trip. Soft deletion travels through
//! `update_transaction` like any other mutation; rows are never physically
//! removed here.

use crate::core::transaction::{
    Transaction, TransactionDetail, TransactionItem, TransactionPayment, TransactionRecord,
};
use crate::entities::{Transaction as TransactionEntity, TransactionColumn, transaction};
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Filter for [`list_transactions`]. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub account_id: Option<String>,
    /// Inclusive date range over the business date.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

fn to_json<T: serde::Serialize>(id: &str, field: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::CorruptRecord {
        id: id.to_string(),
        message: format!("cannot serialize {field}: {e}"),
    })
}

fn from_json<T: serde::de::DeserializeOwned>(id: &str, field: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::CorruptRecord {
        id: id.to_string(),
        message: format!("{field} holds malformed JSON: {e}"),
    })
}

fn detail_columns(
    id: &str,
    detail: &TransactionDetail,
) -> Result<(Option<String>, Option<String>, Option<String>, Option<String>)> {
    match detail {
        TransactionDetail::Deposit { payee, amount } => Ok((
            Some(payee.clone()),
            Some(amount.to_storage()),
            None,
            None,
        )),
        TransactionDetail::Purchase { items, payments } => Ok((
            None,
            None,
            Some(to_json(id, "items", items)?),
            Some(to_json(id, "payments", payments)?),
        )),
    }
}

fn detail_from_row(model: &transaction::Model) -> Result<TransactionDetail> {
    let missing = |field: &str| Error::CorruptRecord {
        id: model.id.clone(),
        message: format!("{field} is required for a {} transaction", model.kind),
    };
    match model.kind.as_str() {
        "deposit" => {
            let payee = model.payee.clone().ok_or_else(|| missing("payee"))?;
            let raw = model.amount.as_deref().ok_or_else(|| missing("amount"))?;
            Ok(TransactionDetail::Deposit {
                payee,
                amount: super::parse_money(&model.id, "amount", raw)?,
            })
        }
        "purchase" => {
            let items_raw = model.items.as_deref().ok_or_else(|| missing("items"))?;
            let payments_raw = model
                .payments
                .as_deref()
                .ok_or_else(|| missing("payments"))?;
            let items: Vec<TransactionItem> = from_json(&model.id, "items", items_raw)?;
            let payments: Vec<TransactionPayment> =
                from_json(&model.id, "payments", payments_raw)?;
            Ok(TransactionDetail::Purchase { items, payments })
        }
        other => Err(Error::CorruptRecord {
            id: model.id.clone(),
            message: format!("unknown transaction kind {other:?}"),
        }),
    }
}

fn from_row(model: transaction::Model) -> Result<Transaction> {
    let detail = detail_from_row(&model)?;
    let tags: Vec<String> = from_json(&model.id, "tags", &model.tags)?;
    Ok(Transaction::load(TransactionRecord {
        id: model.id,
        user_id: model.user_id,
        account_id: model.account_id,
        description: model.description,
        tags,
        transaction_date: model.transaction_date,
        detail,
        date_created: model.date_created,
        date_updated: model.date_updated,
        date_deleted: model.date_deleted,
    }))
}

fn to_active_model(tx: &Transaction) -> Result<transaction::ActiveModel> {
    let (payee, amount, items, payments) = detail_columns(tx.id(), tx.detail())?;
    Ok(transaction::ActiveModel {
        id: Set(tx.id().to_string()),
        user_id: Set(tx.user_id().to_string()),
        account_id: Set(tx.account_id().to_string()),
        kind: Set(tx.detail().kind_str().to_string()),
        description: Set(tx.description().to_string()),
        tags: Set(to_json(tx.id(), "tags", &tx.tags())?),
        payee: Set(payee),
        amount: Set(amount),
        items: Set(items),
        payments: Set(payments),
        transaction_date: Set(tx.transaction_date()),
        date_created: Set(tx.date_created()),
        date_updated: Set(tx.date_updated()),
        date_deleted: Set(tx.date_deleted()),
    })
}

/// Persists a freshly constructed transaction.
#[instrument(skip(db, tx), fields(transaction_id = %tx.id()))]
pub async fn insert_transaction(db: &DatabaseConnection, tx: &Transaction) -> Result<()> {
    to_active_model(tx)?.insert(db).await?;
    info!(
        kind = tx.detail().kind_str(),
        account_id = %tx.account_id(),
        amount = %tx.total_amount(),
        "created transaction"
    );
    Ok(())
}

/// Fetches a transaction by (user, id).
#[instrument(skip(db))]
pub async fn get_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: &str,
) -> Result<Option<Transaction>> {
    let row = TransactionEntity::find_by_id(transaction_id)
        .filter(TransactionColumn::UserId.eq(user_id))
        .one(db)
        .await?;
    row.map(from_row).transpose()
}

/// Lists a user's live transactions, newest business date first.
#[instrument(skip(db, filter))]
pub async fn list_transactions(
    db: &DatabaseConnection,
    user_id: &str,
    filter: &TransactionFilter,
) -> Result<Vec<Transaction>> {
    let mut query = TransactionEntity::find()
        .filter(TransactionColumn::UserId.eq(user_id))
        .filter(TransactionColumn::DateDeleted.is_null());
    if let Some(account_id) = &filter.account_id {
        query = query.filter(TransactionColumn::AccountId.eq(account_id));
    }
    if let Some((from, to)) = filter.date_range {
        query = query
            .filter(TransactionColumn::TransactionDate.gte(from))
            .filter(TransactionColumn::TransactionDate.lte(to));
    }
    let rows = query
        .order_by_desc(TransactionColumn::TransactionDate)
        .order_by_desc(TransactionColumn::DateCreated)
        .all(db)
        .await?;
    rows.into_iter().map(from_row).collect()
}

/// Rewrites a transaction row in place (amount edits, added payments, soft
/// deletion).
#[instrument(skip(db, tx), fields(transaction_id = %tx.id()))]
pub async fn update_transaction(db: &DatabaseConnection, tx: &Transaction) -> Result<()> {
    let changes = transaction::ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        ..to_active_model(tx)?
    };
    let result = TransactionEntity::update_many()
        .set(changes)
        .filter(TransactionColumn::Id.eq(tx.id()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::TransactionNotFound {
            user_id: tx.user_id().to_string(),
            transaction_id: tx.id().to_string(),
        });
    }
    Ok(())
}
