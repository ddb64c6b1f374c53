//! Transaction entity - the persisted row behind the transaction aggregate.
//!
//! The row keeps its document-store heritage: tags, line items and payments
//! are JSON text columns owned entirely by this row, so the aggregate loads
//! and stores in one round trip. `kind` discriminates `"deposit"` from
//! `"purchase"`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// 24-hex-character transaction identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user's identifier
    pub user_id: String,
    /// Account this transaction moves money through
    pub account_id: String,
    /// Kind discriminator: `"deposit"` or `"purchase"`
    pub kind: String,
    /// Human-readable description
    pub description: String,
    /// Ordered tag list as a JSON array
    pub tags: String,
    /// Payee, deposits only
    pub payee: Option<String>,
    /// Deposit amount as a canonical decimal string, deposits only
    pub amount: Option<String>,
    /// Line items as a JSON array, purchases only
    pub items: Option<String>,
    /// Payments as a JSON array, purchases only
    pub payments: Option<String>,
    /// Date-only business date of the event
    pub transaction_date: Date,
    /// When the transaction was created
    pub date_created: DateTimeUtc,
    /// When the transaction was last mutated
    pub date_updated: DateTimeUtc,
    /// Soft-delete marker
    pub date_deleted: Option<DateTimeUtc>,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
