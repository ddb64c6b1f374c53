//! Consistency propagator - reflects transaction events onto the owning
//! account and the matching monthly total.
//!
//! Each event walks the same path: load account, mutate the balance in
//! memory, persist under the optimistic revision check, then reconcile the
//! monthly total by key upsert. A missing account is fatal for the event
//! (retrying cannot conjure the row); persistence failures get a bounded
//! retry with backoff because both persistence steps are idempotent upserts
//! keyed by identity. When the total step exhausts its retries after the
//! balance has committed, the divergence is logged for reconciliation
//! tooling and reported in the outcome instead of unwinding the balance.

use crate::config::PropagatorConfig;
use crate::core::account::Account;
use crate::core::events::LedgerEvent;
use crate::core::money::Money;
use crate::core::monthly::{EntityKind, MonthlyTotal, MonthlyTotalKey};
use crate::db;
use crate::errors::{Error, Result};
use chrono::Datelike;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, instrument, warn};

/// Runtime knobs for the propagation loop.
#[derive(Debug, Clone)]
pub struct PropagatorSettings {
    /// Attempt budget for each persistence step.
    pub max_persist_attempts: u32,
    /// Pause between attempts on a transient failure.
    pub retry_backoff: Duration,
    /// Policy switch for the delete path: when off, deleted transactions
    /// keep their monthly total contribution and totals read as an
    /// append-only historical ledger.
    pub reverse_totals_on_delete: bool,
}

impl Default for PropagatorSettings {
    fn default() -> Self {
        PropagatorSettings::from_config(&PropagatorConfig::default())
    }
}

impl PropagatorSettings {
    #[must_use]
    pub fn from_config(config: &PropagatorConfig) -> Self {
        PropagatorSettings {
            max_persist_attempts: config.max_persist_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            reverse_totals_on_delete: config.reverse_totals_on_delete,
        }
    }
}

/// What a single propagation accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Account balance after the event's effect committed.
    pub account_balance: Money,
    /// Whether the monthly total step completed. `false` means the balance
    /// is committed but the aggregate is stale - the logged divergence.
    pub total_reconciled: bool,
}

/// Propagates one event: account balance first, monthly total second.
#[instrument(skip(db, event, settings), fields(event = event.name(), transaction_id = %event.transaction_id()))]
pub async fn propagate(
    db: &DatabaseConnection,
    event: &LedgerEvent,
    settings: &PropagatorSettings,
) -> Result<PropagationOutcome> {
    let account_balance = persist_balance(db, event, settings).await?;

    match reconcile_total(db, event, settings).await {
        Ok(()) => {
            info!(balance = %account_balance, "event propagated");
            Ok(PropagationOutcome {
                account_balance,
                total_reconciled: true,
            })
        }
        Err(err) => {
            // The balance is already committed; the aggregate is now stale
            // until replayed. Reconciliation tooling keys off this log line.
            error!(
                error = %err,
                account_id = %event.account_id(),
                date = %event.date(),
                "monthly total diverged from committed balance"
            );
            Ok(PropagationOutcome {
                account_balance,
                total_reconciled: false,
            })
        }
    }
}

/// Load-mutate-persist with optimistic retry. A revision conflict means a
/// concurrent writer landed between our load and our store; reloading picks
/// up their committed balance and reapplies this event on top of it.
async fn persist_balance(
    db: &DatabaseConnection,
    event: &LedgerEvent,
    settings: &PropagatorSettings,
) -> Result<Money> {
    let mut attempt = 1;
    loop {
        let mut account = db::get_account(db, event.user_id(), event.account_id())
            .await?
            .ok_or_else(|| Error::AccountNotFound {
                user_id: event.user_id().to_string(),
                account_id: event.account_id().to_string(),
            })?;
        apply_event(&mut account, event)?;

        match db::update_account(db, &mut account).await {
            Ok(()) => return Ok(account.balance()),
            Err(Error::RevisionConflict { .. }) if attempt < settings.max_persist_attempts => {
                warn!(
                    attempt,
                    account_id = %event.account_id(),
                    "lost the revision race; reloading"
                );
                attempt += 1;
            }
            Err(err) if err.is_transient() && attempt < settings.max_persist_attempts => {
                warn!(attempt, error = %err, "account persist failed; backing off");
                tokio::time::sleep(settings.retry_backoff).await;
                attempt += 1;
            }
            Err(err) => {
                error!(
                    error = %err,
                    account_id = %event.account_id(),
                    "account persist failed terminally; balance mutation discarded"
                );
                return Err(err);
            }
        }
    }
}

fn apply_event(account: &mut Account, event: &LedgerEvent) -> Result<()> {
    match event {
        LedgerEvent::TransactionCreated {
            polarity, amount, ..
        } => account.apply(*amount, *polarity),
        LedgerEvent::TransactionDeleted {
            polarity, amount, ..
        } => account.reverse(*amount, *polarity),
        LedgerEvent::TransactionUpdated {
            polarity,
            old_amount,
            new_amount,
            ..
        } => {
            account.reverse(*old_amount, *polarity)?;
            account.apply(*new_amount, *polarity)
        }
    }
}

/// Upserts the event's effect into the account's monthly total row.
async fn reconcile_total(
    db: &DatabaseConnection,
    event: &LedgerEvent,
    settings: &PropagatorSettings,
) -> Result<()> {
    if matches!(event, LedgerEvent::TransactionDeleted { .. })
        && !settings.reverse_totals_on_delete
    {
        // Preserve-history policy: the contribution stands.
        return Ok(());
    }

    let date = event.date();
    let key = MonthlyTotalKey::new(
        event.user_id(),
        event.account_id(),
        EntityKind::Account,
        date.year(),
        date.month(),
    )?;

    let mut attempt = 1;
    loop {
        let result = upsert_total(db, event, &key).await;
        match result {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() && attempt < settings.max_persist_attempts => {
                warn!(attempt, error = %err, "monthly total persist failed; backing off");
                tokio::time::sleep(settings.retry_backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn upsert_total(
    db: &DatabaseConnection,
    event: &LedgerEvent,
    key: &MonthlyTotalKey,
) -> Result<()> {
    let existing = db::get_by_key(db, key).await?;
    let is_new = existing.is_none();
    let mut total = existing.unwrap_or_else(|| MonthlyTotal::new(key.clone()));

    match event {
        LedgerEvent::TransactionCreated {
            polarity, amount, ..
        } => total.contribute(*polarity, *amount)?,
        LedgerEvent::TransactionUpdated {
            polarity,
            old_amount,
            new_amount,
            ..
        } => {
            total.retract(*polarity, *old_amount)?;
            total.contribute(*polarity, *new_amount)?;
        }
        LedgerEvent::TransactionDeleted {
            polarity, amount, ..
        } => total.retract(*polarity, *amount)?,
    }

    if is_new {
        db::insert_monthly_total(db, &total).await
    } else {
        db::update_monthly_total(db, &total).await
    }
}

/// Single-consumer propagation worker. One channel means per-account FIFO
/// for everything a producer sends in order; the revision check covers
/// whatever races remain. Cancellation leaves a mid-flight event wherever
/// it was - there is no compensating rollback.
pub async fn run_propagator(
    db: DatabaseConnection,
    mut events: mpsc::Receiver<LedgerEvent>,
    mut shutdown: watch::Receiver<bool>,
    settings: PropagatorSettings,
) {
    info!("propagator worker started");
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Err(err) = propagate(&db, &event, &settings).await {
                    error!(
                        error = %err,
                        event = event.name(),
                        transaction_id = %event.transaction_id(),
                        "event propagation failed; manual replay required"
                    );
                }
            }
        }
    }
    info!("propagator worker stopped");
}
