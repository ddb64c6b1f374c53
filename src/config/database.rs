//! Database configuration module for `BalanceBook`.
//!
//! Handles `SQLite` connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the stored schema always matches the Rust struct definitions; the
//! monthly-total key tuple additionally gets a unique index, which is what
//! makes the find-then-update upsert safe against duplicate rows.

use crate::entities::{
    Account, MonthlyTotal, MonthlyTotalColumn, Transaction, TransactionColumn,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from the environment or returns the default
/// `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/balancebook.sqlite".to_string())
}

/// Establishes a connection to the database named by `url`.
pub async fn create_connection(url: &str) -> Result<DatabaseConnection> {
    Database::connect(url).await.map_err(Into::into)
}

/// Creates all tables and indexes from the entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let account_table = schema.create_table_from_entity(Account);
    let transaction_table = schema.create_table_from_entity(Transaction);
    let monthly_total_table = schema.create_table_from_entity(MonthlyTotal);

    db.execute(builder.build(&account_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&monthly_total_table)).await?;

    // The natural key of a monthly total row; two rows sharing it are a bug.
    let monthly_total_key = Index::create()
        .name("idx_monthly_totals_key")
        .table(MonthlyTotal)
        .col(MonthlyTotalColumn::UserId)
        .col(MonthlyTotalColumn::EntityId)
        .col(MonthlyTotalColumn::EntityKind)
        .col(MonthlyTotalColumn::Year)
        .col(MonthlyTotalColumn::Month)
        .unique()
        .to_owned();
    db.execute(builder.build(&monthly_total_key)).await?;

    let transactions_by_account = Index::create()
        .name("idx_transactions_account")
        .table(Transaction)
        .col(TransactionColumn::UserId)
        .col(TransactionColumn::AccountId)
        .to_owned();
    db.execute(builder.build(&transactions_by_account)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AccountModel, MonthlyTotalModel, TransactionModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Tables exist if querying them succeeds.
        let _: Vec<AccountModel> = Account::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;
        let _: Vec<MonthlyTotalModel> = MonthlyTotal::find().limit(1).all(&db).await?;

        Ok(())
    }
}
