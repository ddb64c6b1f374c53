//! Account entity - the persisted row behind the account domain model.
//!
//! Kind-specific fields land in nullable columns; the `kind` discriminator
//! tells the mapper which of them are meaningful. Monetary columns hold
//! canonical decimal strings so no precision is lost in storage. `revision`
//! backs the optimistic compare-and-swap in the accounts repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// 24-hex-character account identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user's identifier
    pub user_id: String,
    /// Kind discriminator: `"cash"`, `"checking"`, `"savings"`,
    /// `"credit_card"`, `"line_of_credit"` or `"loan"`
    pub kind: String,
    /// Display name, at most 50 characters
    pub name: String,
    /// Current balance as a canonical decimal string
    pub balance: String,
    /// Display color for client rendering
    pub display_color: String,
    /// Optional free-form description
    pub description: Option<String>,
    /// Whether this is the user's default account
    pub is_default: bool,
    /// Client-facing ordering
    pub sort_order: i32,
    /// Overdraft allowance, checking accounts only
    pub overdraft_amount: Option<String>,
    /// Interest rate, savings and borrowing kinds
    pub interest_rate: Option<String>,
    /// Credit limit, borrowing kinds only
    pub credit_limit: Option<String>,
    /// Optimistic concurrency counter, bumped on every update
    pub revision: i64,
    /// When the account was created
    pub date_created: DateTimeUtc,
    /// When the account was last mutated
    pub date_updated: DateTimeUtc,
    /// Set when a borrowing account is closed
    pub date_closed: Option<DateTimeUtc>,
    /// Soft-delete marker
    pub date_deleted: Option<DateTimeUtc>,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
