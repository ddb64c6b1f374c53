//! Accounts repository - row mapping and optimistic persistence.
//!
//! `update_account` performs a compare-and-swap on the `revision` column:
//! the update only lands if the row still carries the revision the caller
//! loaded, so two writers racing on the same stale balance cannot silently
//! lose an update. A zero-row update surfaces as `RevisionConflict` and the
//! caller reloads and reapplies.

use crate::core::account::{Account, AccountDetail, AccountKind, AccountRecord};
use crate::entities::{Account as AccountEntity, AccountColumn, account};
use crate::errors::{Error, Result};
use sea_orm::{DatabaseConnection, QueryOrder, Set, prelude::*};
use tracing::{debug, info, instrument};

fn detail_columns(detail: &AccountDetail) -> (Option<String>, Option<String>, Option<String>) {
    let overdraft = detail.overdraft_amount().map(|m| m.to_storage());
    let interest = detail.interest_rate().map(|r| r.normalize().to_string());
    let limit = detail.credit_limit().map(|m| m.to_storage());
    (overdraft, interest, limit)
}

fn detail_from_row(model: &account::Model) -> Result<AccountDetail> {
    let kind = AccountKind::parse(&model.kind)?;
    let missing = |field: &str| Error::CorruptRecord {
        id: model.id.clone(),
        message: format!("{field} is required for a {} account", model.kind),
    };

    match kind {
        AccountKind::Cash => Ok(AccountDetail::Cash),
        AccountKind::Checking => {
            let raw = model
                .overdraft_amount
                .as_deref()
                .ok_or_else(|| missing("overdraft_amount"))?;
            Ok(AccountDetail::Checking {
                overdraft_amount: super::parse_money(&model.id, "overdraft_amount", raw)?,
            })
        }
        AccountKind::Savings => {
            let raw = model
                .interest_rate
                .as_deref()
                .ok_or_else(|| missing("interest_rate"))?;
            Ok(AccountDetail::Savings {
                interest_rate: super::parse_decimal(&model.id, "interest_rate", raw)?,
            })
        }
        AccountKind::CreditCard | AccountKind::LineOfCredit | AccountKind::Loan => {
            let limit_raw = model
                .credit_limit
                .as_deref()
                .ok_or_else(|| missing("credit_limit"))?;
            let rate_raw = model
                .interest_rate
                .as_deref()
                .ok_or_else(|| missing("interest_rate"))?;
            let credit_limit = super::parse_money(&model.id, "credit_limit", limit_raw)?;
            let interest_rate = super::parse_decimal(&model.id, "interest_rate", rate_raw)?;
            Ok(match kind {
                AccountKind::CreditCard => AccountDetail::CreditCard {
                    credit_limit,
                    interest_rate,
                },
                AccountKind::LineOfCredit => AccountDetail::LineOfCredit {
                    credit_limit,
                    interest_rate,
                },
                _ => AccountDetail::Loan {
                    credit_limit,
                    interest_rate,
                },
            })
        }
    }
}

fn from_row(model: account::Model) -> Result<Account> {
    let detail = detail_from_row(&model)?;
    Ok(Account::load(AccountRecord {
        balance: super::parse_money(&model.id, "balance", &model.balance)?,
        id: model.id,
        user_id: model.user_id,
        name: model.name,
        display_color: model.display_color,
        description: model.description,
        is_default: model.is_default,
        sort_order: model.sort_order,
        revision: model.revision,
        detail,
        date_created: model.date_created,
        date_updated: model.date_updated,
        date_closed: model.date_closed,
        date_deleted: model.date_deleted,
    }))
}

/// Persists a freshly constructed account.
#[instrument(skip(db, account), fields(account_id = %account.id()))]
pub async fn insert_account(db: &DatabaseConnection, account: &Account) -> Result<()> {
    let (overdraft, interest, limit) = detail_columns(account.detail());
    let row = account::ActiveModel {
        id: Set(account.id().to_string()),
        user_id: Set(account.user_id().to_string()),
        kind: Set(account.kind().as_str().to_string()),
        name: Set(account.name().to_string()),
        balance: Set(account.balance().to_storage()),
        display_color: Set(account.display_color().to_string()),
        description: Set(account.description().map(str::to_string)),
        is_default: Set(account.is_default()),
        sort_order: Set(account.sort_order()),
        overdraft_amount: Set(overdraft),
        interest_rate: Set(interest),
        credit_limit: Set(limit),
        revision: Set(account.revision()),
        date_created: Set(account.date_created()),
        date_updated: Set(account.date_updated()),
        date_closed: Set(account.date_closed()),
        date_deleted: Set(account.date_deleted()),
    };
    row.insert(db).await?;
    info!(
        kind = account.kind().as_str(),
        user_id = %account.user_id(),
        "created account"
    );
    Ok(())
}

/// Fetches an account by (user, id), deleted or not; the domain model itself
/// guards mutations on deleted accounts.
#[instrument(skip(db))]
pub async fn get_account(
    db: &DatabaseConnection,
    user_id: &str,
    account_id: &str,
) -> Result<Option<Account>> {
    let row = AccountEntity::find_by_id(account_id)
        .filter(AccountColumn::UserId.eq(user_id))
        .one(db)
        .await?;
    row.map(from_row).transpose()
}

/// Lists a user's live accounts ordered by sort order, then name.
#[instrument(skip(db))]
pub async fn list_accounts(db: &DatabaseConnection, user_id: &str) -> Result<Vec<Account>> {
    let rows = AccountEntity::find()
        .filter(AccountColumn::UserId.eq(user_id))
        .filter(AccountColumn::DateDeleted.is_null())
        .order_by_asc(AccountColumn::SortOrder)
        .order_by_asc(AccountColumn::Name)
        .all(db)
        .await?;
    rows.into_iter().map(from_row).collect()
}

/// Persists a mutated account under the optimistic revision check. On
/// success the in-memory revision is bumped to match the stored row.
#[instrument(skip(db, account), fields(account_id = %account.id(), revision = account.revision()))]
pub async fn update_account(db: &DatabaseConnection, account: &mut Account) -> Result<()> {
    let loaded_revision = account.revision();
    let (overdraft, interest, limit) = detail_columns(account.detail());
    let changes = account::ActiveModel {
        user_id: Set(account.user_id().to_string()),
        kind: Set(account.kind().as_str().to_string()),
        name: Set(account.name().to_string()),
        balance: Set(account.balance().to_storage()),
        display_color: Set(account.display_color().to_string()),
        description: Set(account.description().map(str::to_string)),
        is_default: Set(account.is_default()),
        sort_order: Set(account.sort_order()),
        overdraft_amount: Set(overdraft),
        interest_rate: Set(interest),
        credit_limit: Set(limit),
        revision: Set(loaded_revision + 1),
        date_updated: Set(account.date_updated()),
        date_closed: Set(account.date_closed()),
        date_deleted: Set(account.date_deleted()),
        ..Default::default()
    };

    let result = AccountEntity::update_many()
        .set(changes)
        .filter(AccountColumn::Id.eq(account.id()))
        .filter(AccountColumn::Revision.eq(loaded_revision))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::RevisionConflict {
            account_id: account.id().to_string(),
            revision: loaded_revision,
        });
    }
    account.bump_revision();
    debug!(balance = %account.balance(), "account persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::account::{AccountKind, AccountUpdate};
    use crate::core::transaction::Polarity;
    use crate::test_utils::{money, setup_test_db, test_account, test_detail, test_user_id};

    #[tokio::test]
    async fn round_trips_every_kind() -> Result<()> {
        let db = setup_test_db().await?;
        for kind in AccountKind::ALL {
            let account = test_account(kind);
            insert_account(&db, &account).await?;
            let loaded = get_account(&db, account.user_id(), account.id())
                .await?
                .unwrap();
            assert_eq!(loaded, account, "{kind:?}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn get_scopes_by_user() -> Result<()> {
        let db = setup_test_db().await?;
        let account = test_account(AccountKind::Cash);
        insert_account(&db, &account).await?;

        let other_user = crate::core::ident::new_object_id();
        assert!(get_account(&db, &other_user, account.id()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn list_orders_by_sort_order_then_name() -> Result<()> {
        let db = setup_test_db().await?;
        let user_id = test_user_id();
        for (name, sort_order) in [("Beta", 1), ("Alpha", 1), ("Zed", 0)] {
            let account = Account::new(
                user_id.clone(),
                name,
                test_detail(AccountKind::Checking),
                "#000000",
                false,
                sort_order,
            )?;
            insert_account(&db, &account).await?;
        }

        let names: Vec<String> = list_accounts(&db, &user_id)
            .await?
            .into_iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, ["Zed", "Alpha", "Beta"]);
        Ok(())
    }

    #[tokio::test]
    async fn list_hides_soft_deleted_accounts() -> Result<()> {
        let db = setup_test_db().await?;
        let mut account = test_account(AccountKind::Savings);
        let user_id = account.user_id().to_string();
        insert_account(&db, &account).await?;

        account.mark_deleted().unwrap();
        update_account(&db, &mut account).await?;

        assert!(list_accounts(&db, &user_id).await?.is_empty());
        // Direct get still returns the row for reversal tooling.
        assert!(get_account(&db, &user_id, account.id()).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let account = test_account(AccountKind::Cash);
        insert_account(&db, &account).await?;

        // Two writers load the same revision.
        let mut first = get_account(&db, account.user_id(), account.id())
            .await?
            .unwrap();
        let mut second = first.clone();

        first.apply(money("10.00"), Polarity::Credit).unwrap();
        update_account(&db, &mut first).await?;

        second.apply(money("25.00"), Polarity::Credit).unwrap();
        let err = update_account(&db, &mut second).await.unwrap_err();
        assert!(matches!(err, Error::RevisionConflict { .. }));

        // The first write survived untouched.
        let stored = get_account(&db, account.user_id(), account.id())
            .await?
            .unwrap();
        assert_eq!(stored.balance(), money("10.00"));
        assert_eq!(stored.revision(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn successful_update_bumps_revision() -> Result<()> {
        let db = setup_test_db().await?;
        let mut account = test_account(AccountKind::Cash);
        insert_account(&db, &account).await?;

        account
            .update_details(AccountUpdate {
                name: Some("Renamed".to_string()),
                ..AccountUpdate::default()
            })
            .unwrap();
        update_account(&db, &mut account).await?;
        assert_eq!(account.revision(), 1);

        account.apply(money("5"), Polarity::Credit).unwrap();
        update_account(&db, &mut account).await?;
        assert_eq!(account.revision(), 2);

        let stored = get_account(&db, account.user_id(), account.id())
            .await?
            .unwrap();
        assert_eq!(stored.name(), "Renamed");
        assert_eq!(stored.revision(), 2);
        Ok(())
    }
}
