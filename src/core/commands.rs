//! Command layer - the public entry points for account and transaction
//! lifecycle operations.
//!
//! Expected failures (validation, not-found, gated operations) never cross
//! this boundary as errors; they surface as a [`CommandOutcome::Failed`]
//! carrying human-readable messages. Only genuinely unexpected faults, such
//! as the persistence layer erroring, propagate as `Err`. Transaction
//! commands persist first, then emit the matching [`LedgerEvent`] for the
//! propagator.

use crate::core::account::{Account, AccountDetail, AccountUpdate};
use crate::core::events::LedgerEvent;
use crate::core::money::Money;
use crate::core::transaction::{NewItem, Transaction};
use crate::db;
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;
use tracing::info;

/// Reload budget when an optimistic update loses the revision race.
const MAX_COMMAND_ATTEMPTS: u32 = 3;

/// Structured result of a command: the produced value, or the reasons the
/// command was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome<T> {
    Success(T),
    Failed { messages: Vec<String> },
}

impl<T> CommandOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    /// Unwraps the success value; panics on a failed outcome, so this is
    /// only for tests and callers that just checked.
    #[must_use]
    pub fn into_success(self) -> T {
        match self {
            CommandOutcome::Success(value) => value,
            CommandOutcome::Failed { messages } => {
                panic!("command failed: {}", messages.join("; "))
            }
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        match self {
            CommandOutcome::Success(_) => &[],
            CommandOutcome::Failed { messages } => messages,
        }
    }
}

/// Converts expected domain failures into a failed outcome; anything else
/// keeps propagating as a fault.
fn reject<T>(err: Error) -> Result<CommandOutcome<T>> {
    match err {
        Error::Validation { .. }
        | Error::InvalidAmount { .. }
        | Error::InvalidOperation { .. }
        | Error::AccountNotFound { .. }
        | Error::TransactionNotFound { .. } => Ok(CommandOutcome::Failed {
            messages: vec![err.to_string()],
        }),
        other => Err(other),
    }
}

fn failed<T>(message: impl Into<String>) -> CommandOutcome<T> {
    CommandOutcome::Failed {
        messages: vec![message.into()],
    }
}

async fn emit(events: &mpsc::Sender<LedgerEvent>, event: LedgerEvent) -> Result<()> {
    events.send(event).await.map_err(|_| Error::ChannelClosed)
}

/// Arguments for [`create_account`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub name: String,
    pub detail: AccountDetail,
    pub display_color: String,
    pub is_default: bool,
    pub sort_order: i32,
}

/// Arguments for [`create_deposit`].
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub user_id: String,
    pub account_id: String,
    pub payee: String,
    pub amount: Money,
    pub description: String,
    pub tags: Vec<String>,
    pub date: NaiveDate,
}

/// Arguments for [`create_purchase`].
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: String,
    pub account_id: String,
    pub items: Vec<NewItem>,
    pub description: String,
    pub tags: Vec<String>,
    pub date: NaiveDate,
}

/// Creates and persists a new account.
pub async fn create_account(
    db: &DatabaseConnection,
    args: NewAccount,
) -> Result<CommandOutcome<Account>> {
    let account = match Account::new(
        args.user_id,
        args.name,
        args.detail,
        args.display_color,
        args.is_default,
        args.sort_order,
    ) {
        Ok(account) => account,
        Err(err) => return reject(err),
    };
    db::insert_account(db, &account).await?;
    Ok(CommandOutcome::Success(account))
}

/// Applies detail changes to an account under the optimistic revision
/// check, reloading on a lost race.
pub async fn update_account_details(
    db: &DatabaseConnection,
    user_id: &str,
    account_id: &str,
    update: AccountUpdate,
) -> Result<CommandOutcome<Account>> {
    for _ in 0..MAX_COMMAND_ATTEMPTS {
        let Some(mut account) = db::get_account(db, user_id, account_id).await? else {
            return Ok(failed(format!("account {account_id} not found")));
        };
        let changed = match account.update_details(update.clone()) {
            Ok(changed) => changed,
            Err(err) => return reject(err),
        };
        if !changed {
            return Ok(CommandOutcome::Success(account));
        }
        match db::update_account(db, &mut account).await {
            Ok(()) => return Ok(CommandOutcome::Success(account)),
            Err(Error::RevisionConflict { .. }) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(Error::RevisionConflict {
        account_id: account_id.to_string(),
        revision: 0,
    })
}

/// Closes a borrowing-style account.
pub async fn close_account(
    db: &DatabaseConnection,
    user_id: &str,
    account_id: &str,
) -> Result<CommandOutcome<Account>> {
    mutate_account(db, user_id, account_id, Account::close).await
}

/// Soft-deletes an account. Deletion is refused while money remains on the
/// balance, and always refused for non-deletable kinds. Both gates run
/// inside [`mutate_account`]'s load-check-store loop, so a balance that a
/// concurrent writer commits between attempts is seen before the delete
/// mark persists.
pub async fn delete_account(
    db: &DatabaseConnection,
    user_id: &str,
    account_id: &str,
) -> Result<CommandOutcome<Account>> {
    mutate_account(db, user_id, account_id, Account::mark_deleted).await
}

async fn mutate_account(
    db: &DatabaseConnection,
    user_id: &str,
    account_id: &str,
    op: fn(&mut Account) -> Result<()>,
) -> Result<CommandOutcome<Account>> {
    for _ in 0..MAX_COMMAND_ATTEMPTS {
        let Some(mut account) = db::get_account(db, user_id, account_id).await? else {
            return Ok(failed(format!("account {account_id} not found")));
        };
        if let Err(err) = op(&mut account) {
            return reject(err);
        }
        match db::update_account(db, &mut account).await {
            Ok(()) => return Ok(CommandOutcome::Success(account)),
            Err(Error::RevisionConflict { .. }) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(Error::RevisionConflict {
        account_id: account_id.to_string(),
        revision: 0,
    })
}

/// Creates a deposit, persists it and emits `TransactionCreated`.
pub async fn create_deposit(
    db: &DatabaseConnection,
    events: &mpsc::Sender<LedgerEvent>,
    args: NewDeposit,
) -> Result<CommandOutcome<Transaction>> {
    let transaction = match Transaction::new_deposit(
        args.user_id,
        args.account_id,
        args.payee,
        args.amount,
        args.description,
        args.tags,
        args.date,
    ) {
        Ok(transaction) => transaction,
        Err(err) => return reject(err),
    };
    persist_and_emit(db, events, transaction).await
}

/// Creates a purchase, persists it and emits `TransactionCreated`.
pub async fn create_purchase(
    db: &DatabaseConnection,
    events: &mpsc::Sender<LedgerEvent>,
    args: NewPurchase,
) -> Result<CommandOutcome<Transaction>> {
    let transaction = match Transaction::new_purchase(
        args.user_id,
        args.account_id,
        args.items,
        args.description,
        args.tags,
        args.date,
    ) {
        Ok(transaction) => transaction,
        Err(err) => return reject(err),
    };
    persist_and_emit(db, events, transaction).await
}

async fn persist_and_emit(
    db: &DatabaseConnection,
    events: &mpsc::Sender<LedgerEvent>,
    mut transaction: Transaction,
) -> Result<CommandOutcome<Transaction>> {
    let Some(account) =
        db::get_account(db, transaction.user_id(), transaction.account_id()).await?
    else {
        return Ok(failed(format!(
            "account {} not found",
            transaction.account_id()
        )));
    };
    if account.is_deleted() {
        return Ok(failed(format!(
            "account {} is deleted",
            transaction.account_id()
        )));
    }

    db::insert_transaction(db, &transaction).await?;
    transaction.mark_persisted();
    emit(events, LedgerEvent::created(&transaction)).await?;
    info!(
        transaction_id = %transaction.id(),
        kind = transaction.detail().kind_str(),
        "transaction created and queued for propagation"
    );
    Ok(CommandOutcome::Success(transaction))
}

/// Replaces a deposit's amount, persists it and emits `TransactionUpdated`
/// carrying both the old and the new amount.
pub async fn update_deposit_amount(
    db: &DatabaseConnection,
    events: &mpsc::Sender<LedgerEvent>,
    user_id: &str,
    transaction_id: &str,
    new_amount: Money,
) -> Result<CommandOutcome<Transaction>> {
    let Some(mut transaction) = db::get_transaction(db, user_id, transaction_id).await? else {
        return Ok(failed(format!("transaction {transaction_id} not found")));
    };
    let old_amount = match transaction.set_deposit_amount(new_amount) {
        Ok(old_amount) => old_amount,
        Err(err) => return reject(err),
    };
    db::update_transaction(db, &transaction).await?;
    emit(events, LedgerEvent::updated(&transaction, old_amount)).await?;
    Ok(CommandOutcome::Success(transaction))
}

/// Soft-deletes a transaction, persists the mark and emits
/// `TransactionDeleted` with the total the propagator must reverse.
pub async fn delete_transaction(
    db: &DatabaseConnection,
    events: &mpsc::Sender<LedgerEvent>,
    user_id: &str,
    transaction_id: &str,
) -> Result<CommandOutcome<Transaction>> {
    let Some(mut transaction) = db::get_transaction(db, user_id, transaction_id).await? else {
        return Ok(failed(format!("transaction {transaction_id} not found")));
    };
    if let Err(err) = transaction.delete() {
        return reject(err);
    }
    db::update_transaction(db, &transaction).await?;
    emit(events, LedgerEvent::deleted(&transaction)).await?;
    info!(transaction_id, "transaction soft-deleted and queued for reversal");
    Ok(CommandOutcome::Success(transaction))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::account::AccountKind;
    use crate::core::propagator::{PropagatorSettings, propagate};
    use crate::test_utils::{money, setup_test_db, test_account, test_detail, test_user_id};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn channel() -> (mpsc::Sender<LedgerEvent>, mpsc::Receiver<LedgerEvent>) {
        mpsc::channel(8)
    }

    #[tokio::test]
    async fn create_account_persists_and_returns_it() -> Result<()> {
        let db = setup_test_db().await?;
        let outcome = create_account(
            &db,
            NewAccount {
                user_id: test_user_id(),
                name: "Wallet".to_string(),
                detail: test_detail(AccountKind::Cash),
                display_color: "#00aa44".to_string(),
                is_default: true,
                sort_order: 0,
            },
        )
        .await?;
        let account = outcome.into_success();
        assert!(
            db::get_account(&db, account.user_id(), account.id())
                .await?
                .is_some()
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_account_name_fails_with_a_message() -> Result<()> {
        let db = setup_test_db().await?;
        let outcome = create_account(
            &db,
            NewAccount {
                user_id: test_user_id(),
                name: String::new(),
                detail: test_detail(AccountKind::Cash),
                display_color: "#00aa44".to_string(),
                is_default: false,
                sort_order: 0,
            },
        )
        .await?;
        assert!(!outcome.is_success());
        assert!(outcome.messages()[0].contains("name"));
        Ok(())
    }

    #[tokio::test]
    async fn deposit_command_emits_a_created_event() -> Result<()> {
        let db = setup_test_db().await?;
        let account = test_account(AccountKind::Cash);
        db::insert_account(&db, &account).await?;
        let (tx, mut rx) = channel();

        let outcome = create_deposit(
            &db,
            &tx,
            NewDeposit {
                user_id: account.user_id().to_string(),
                account_id: account.id().to_string(),
                payee: "Employer".to_string(),
                amount: money("150.00"),
                description: "salary".to_string(),
                tags: vec![],
                date: date(2024, 3, 10),
            },
        )
        .await?;
        let deposit = outcome.into_success();

        let event = rx.try_recv().unwrap();
        assert_eq!(event, LedgerEvent::created(&deposit));
        Ok(())
    }

    #[tokio::test]
    async fn deposit_against_unknown_account_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let (tx, mut rx) = channel();
        let outcome = create_deposit(
            &db,
            &tx,
            NewDeposit {
                user_id: test_user_id(),
                account_id: crate::core::ident::new_object_id(),
                payee: "Employer".to_string(),
                amount: money("1.00"),
                description: "salary".to_string(),
                tags: vec![],
                date: date(2024, 3, 10),
            },
        )
        .await?;
        assert!(!outcome.is_success());
        assert!(rx.try_recv().is_err(), "no event for a rejected command");
        Ok(())
    }

    #[tokio::test]
    async fn create_then_propagate_reaches_the_balance() -> Result<()> {
        // End-to-end: command emits, propagator consumes.
        let db = setup_test_db().await?;
        let (tx, mut rx) = channel();

        let account = create_account(
            &db,
            NewAccount {
                user_id: test_user_id(),
                name: "Wallet".to_string(),
                detail: test_detail(AccountKind::Cash),
                display_color: "#00aa44".to_string(),
                is_default: true,
                sort_order: 0,
            },
        )
        .await?
        .into_success();

        let _ = create_deposit(
            &db,
            &tx,
            NewDeposit {
                user_id: account.user_id().to_string(),
                account_id: account.id().to_string(),
                payee: "Employer".to_string(),
                amount: money("150.00"),
                description: "salary".to_string(),
                tags: vec![],
                date: date(2024, 3, 10),
            },
        )
        .await?
        .into_success();

        let event = rx.recv().await.unwrap();
        propagate(&db, &event, &PropagatorSettings::default()).await?;

        let stored = db::get_account(&db, account.user_id(), account.id())
            .await?
            .unwrap();
        assert_eq!(stored.balance(), money("150.00"));
        Ok(())
    }

    #[tokio::test]
    async fn update_deposit_amount_emits_old_and_new() -> Result<()> {
        let db = setup_test_db().await?;
        let account = test_account(AccountKind::Cash);
        db::insert_account(&db, &account).await?;
        let (tx, mut rx) = channel();

        let deposit = create_deposit(
            &db,
            &tx,
            NewDeposit {
                user_id: account.user_id().to_string(),
                account_id: account.id().to_string(),
                payee: "Employer".to_string(),
                amount: money("150.00"),
                description: "salary".to_string(),
                tags: vec![],
                date: date(2024, 3, 10),
            },
        )
        .await?
        .into_success();
        let _ = rx.try_recv().unwrap();

        let updated = update_deposit_amount(
            &db,
            &tx,
            account.user_id(),
            deposit.id(),
            money("175.00"),
        )
        .await?
        .into_success();
        assert_eq!(updated.total_amount(), money("175.00"));

        match rx.try_recv().unwrap() {
            LedgerEvent::TransactionUpdated {
                old_amount,
                new_amount,
                ..
            } => {
                assert_eq!(old_amount, money("150.00"));
                assert_eq!(new_amount, money("175.00"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn delete_transaction_is_rejected_twice() -> Result<()> {
        let db = setup_test_db().await?;
        let account = test_account(AccountKind::Cash);
        db::insert_account(&db, &account).await?;
        let (tx, mut rx) = channel();

        let deposit = create_deposit(
            &db,
            &tx,
            NewDeposit {
                user_id: account.user_id().to_string(),
                account_id: account.id().to_string(),
                payee: "Employer".to_string(),
                amount: money("10.00"),
                description: "salary".to_string(),
                tags: vec![],
                date: date(2024, 3, 10),
            },
        )
        .await?
        .into_success();
        let _ = rx.try_recv().unwrap();

        let first = delete_transaction(&db, &tx, account.user_id(), deposit.id()).await?;
        assert!(first.is_success());
        let second = delete_transaction(&db, &tx, account.user_id(), deposit.id()).await?;
        assert!(!second.is_success());
        assert!(second.messages()[0].contains("already deleted"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_account_refuses_a_live_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let mut account = test_account(AccountKind::Savings);
        account
            .apply(money("5.00"), crate::core::transaction::Polarity::Credit)
            .unwrap();
        db::insert_account(&db, &account).await?;

        let outcome = delete_account(&db, account.user_id(), account.id()).await?;
        assert!(!outcome.is_success());
        assert!(outcome.messages()[0].contains("balance"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_account_sees_a_deposit_committed_after_creation() -> Result<()> {
        // A deposit propagated after the account looked empty must still
        // block deletion: the balance gate runs on the row the delete's
        // own optimistic update loads, not on any earlier snapshot.
        let db = setup_test_db().await?;
        let account = test_account(AccountKind::Savings);
        db::insert_account(&db, &account).await?;
        let (tx, mut rx) = channel();
        let settings = PropagatorSettings::default();

        let deposit = create_deposit(
            &db,
            &tx,
            NewDeposit {
                user_id: account.user_id().to_string(),
                account_id: account.id().to_string(),
                payee: "Employer".to_string(),
                amount: money("150.00"),
                description: "salary".to_string(),
                tags: vec![],
                date: date(2024, 3, 10),
            },
        )
        .await?
        .into_success();
        propagate(&db, &rx.recv().await.unwrap(), &settings).await?;

        let outcome = delete_account(&db, account.user_id(), account.id()).await?;
        assert!(!outcome.is_success());
        assert!(outcome.messages()[0].contains("balance"));
        let stored = db::get_account(&db, account.user_id(), account.id())
            .await?
            .unwrap();
        assert!(!stored.is_deleted());

        // Reversing the deposit drains the balance and unblocks deletion.
        let _ = delete_transaction(&db, &tx, account.user_id(), deposit.id())
            .await?
            .into_success();
        propagate(&db, &rx.recv().await.unwrap(), &settings).await?;

        let outcome = delete_account(&db, account.user_id(), account.id()).await?;
        assert!(outcome.into_success().is_deleted());
        Ok(())
    }

    #[tokio::test]
    async fn close_account_is_kind_gated_at_the_boundary() -> Result<()> {
        let db = setup_test_db().await?;
        let cash = test_account(AccountKind::Cash);
        db::insert_account(&db, &cash).await?;

        let outcome = close_account(&db, cash.user_id(), cash.id()).await?;
        assert!(!outcome.is_success());

        let card = test_account(AccountKind::CreditCard);
        db::insert_account(&db, &card).await?;
        let outcome = close_account(&db, card.user_id(), card.id()).await?;
        assert!(outcome.into_success().is_closed());
        Ok(())
    }

    #[tokio::test]
    async fn update_details_round_trips_through_storage() -> Result<()> {
        let db = setup_test_db().await?;
        let account = test_account(AccountKind::Checking);
        db::insert_account(&db, &account).await?;

        let outcome = update_account_details(
            &db,
            account.user_id(),
            account.id(),
            AccountUpdate {
                name: Some("Joint Checking".to_string()),
                ..AccountUpdate::default()
            },
        )
        .await?;
        assert_eq!(outcome.into_success().name(), "Joint Checking");

        let stored = db::get_account(&db, account.user_id(), account.id())
            .await?
            .unwrap();
        assert_eq!(stored.name(), "Joint Checking");
        assert_eq!(stored.revision(), 1);
        Ok(())
    }
}
