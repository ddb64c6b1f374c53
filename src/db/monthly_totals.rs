//! Monthly totals repository - upsert-by-key persistence for the aggregate.
//!
//! The contract is find-by-key then update-in-place; a new row is only
//! constructed when none exists for the tuple. The unique index created in
//! `config::database` turns any accidental duplicate insert into a hard
//! database error instead of a silent second row.

use crate::core::monthly::{EntityKind, MonthlyTotal, MonthlyTotalKey, MonthlyTotalRecord};
use crate::entities::{MonthlyTotal as MonthlyTotalEntity, MonthlyTotalColumn, monthly_total};
use crate::errors::{Error, Result};
use sea_orm::{DatabaseConnection, Set, prelude::*};
use tracing::{debug, instrument};

fn from_row(model: monthly_total::Model) -> Result<MonthlyTotal> {
    let entity_kind = EntityKind::parse(&model.entity_kind)?;
    let month = u32::try_from(model.month).map_err(|_| Error::CorruptRecord {
        id: model.id.clone(),
        message: format!("month column holds {}", model.month),
    })?;
    Ok(MonthlyTotal::load(MonthlyTotalRecord {
        credit_total_amount: super::parse_money(
            &model.id,
            "credit_total_amount",
            &model.credit_total_amount,
        )?,
        debit_total_amount: super::parse_money(
            &model.id,
            "debit_total_amount",
            &model.debit_total_amount,
        )?,
        key: MonthlyTotalKey {
            user_id: model.user_id,
            entity_id: model.entity_id,
            entity_kind,
            year: model.year,
            month,
        },
        id: model.id,
        credit_count: model.credit_count,
        debit_count: model.debit_count,
        date_created: model.date_created,
        date_updated: model.date_updated,
    }))
}

/// Looks up the row for a key tuple.
#[instrument(skip(db, key), fields(entity_id = %key.entity_id, year = key.year, month = key.month))]
pub async fn get_by_key(
    db: &DatabaseConnection,
    key: &MonthlyTotalKey,
) -> Result<Option<MonthlyTotal>> {
    let row = MonthlyTotalEntity::find()
        .filter(MonthlyTotalColumn::UserId.eq(&key.user_id))
        .filter(MonthlyTotalColumn::EntityId.eq(&key.entity_id))
        .filter(MonthlyTotalColumn::EntityKind.eq(key.entity_kind.as_str()))
        .filter(MonthlyTotalColumn::Year.eq(key.year))
        .filter(MonthlyTotalColumn::Month.eq(key.month))
        .one(db)
        .await?;
    row.map(from_row).transpose()
}

/// Persists the first row for a key tuple.
#[instrument(skip(db, total), fields(monthly_total_id = %total.id()))]
pub async fn insert_monthly_total(db: &DatabaseConnection, total: &MonthlyTotal) -> Result<()> {
    let key = total.key();
    let month = i32::try_from(key.month).map_err(|_| {
        Error::validation(format!("month {} exceeds storage range", key.month))
    })?;
    let row = monthly_total::ActiveModel {
        id: Set(total.id().to_string()),
        user_id: Set(key.user_id.clone()),
        entity_id: Set(key.entity_id.clone()),
        entity_kind: Set(key.entity_kind.as_str().to_string()),
        year: Set(key.year),
        month: Set(month),
        credit_total_amount: Set(total.credit_total_amount().to_storage()),
        credit_count: Set(total.credit_count()),
        debit_total_amount: Set(total.debit_total_amount().to_storage()),
        debit_count: Set(total.debit_count()),
        date_created: Set(total.date_created()),
        date_updated: Set(total.date_updated()),
    };
    row.insert(db).await?;
    debug!("created monthly total row");
    Ok(())
}

/// Updates an existing row in place by id.
#[instrument(skip(db, total), fields(monthly_total_id = %total.id()))]
pub async fn update_monthly_total(db: &DatabaseConnection, total: &MonthlyTotal) -> Result<()> {
    let changes = monthly_total::ActiveModel {
        credit_total_amount: Set(total.credit_total_amount().to_storage()),
        credit_count: Set(total.credit_count()),
        debit_total_amount: Set(total.debit_total_amount().to_storage()),
        debit_count: Set(total.debit_count()),
        date_updated: Set(total.date_updated()),
        ..Default::default()
    };
    let result = MonthlyTotalEntity::update_many()
        .set(changes)
        .filter(MonthlyTotalColumn::Id.eq(total.id()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::CorruptRecord {
            id: total.id().to_string(),
            message: "monthly total row vanished between find and update".to_string(),
        });
    }
    Ok(())
}
