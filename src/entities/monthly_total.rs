//! Monthly total entity - one row per (user, entity, kind, year, month).
//!
//! A unique index over the key tuple (created alongside the table) backs the
//! invariant that two rows never share it; the repository updates in place
//! when the tuple already exists.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monthly total database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_totals")]
pub struct Model {
    /// 24-hex-character row identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user's identifier
    pub user_id: String,
    /// Identifier of the aggregated entity (account, category, ...)
    pub entity_id: String,
    /// Entity stream discriminator: `"account"`, `"category"` or `"merchant"`
    pub entity_kind: String,
    /// Calendar year of the bucket
    pub year: i32,
    /// Calendar month of the bucket, 1 through 12
    pub month: i32,
    /// Sum of credit contributions as a canonical decimal string
    pub credit_total_amount: String,
    /// Number of credit contributions
    pub credit_count: i32,
    /// Sum of debit contributions as a canonical decimal string
    pub debit_total_amount: String,
    /// Number of debit contributions
    pub debit_count: i32,
    /// When the row was created
    pub date_created: DateTimeUtc,
    /// When the row last absorbed a contribution
    pub date_updated: DateTimeUtc,
}

/// Monthly totals reference other entities only by opaque id
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
