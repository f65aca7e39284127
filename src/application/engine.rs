use crate::domain::account::Account;
use crate::domain::ports::{LedgerStoreRef, LedgerTx};
use crate::domain::transfer::{TransferParams, TransferResult};
use crate::error::{BankError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Executes funds transfers as single atomic units of work.
///
/// Balance rows are always locked in ascending account-id order, whichever side is
/// the source, so two transfers over the same pair of accounts can never wait on
/// each other in a cycle.
#[derive(Clone)]
pub struct TransferEngine {
    store: LedgerStoreRef,
}

impl TransferEngine {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LedgerStoreRef {
        &self.store
    }

    /// Moves `from_amount` out of the source account and `to_amount` into the
    /// destination. Either every record is written, or none is.
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult> {
        params.validate()?;

        let mut tx = self.store.begin().await?;
        match execute(tx.as_mut(), &params).await {
            Ok(result) => {
                tx.commit().await?;
                debug!(
                    transfer_id = result.transfer.id,
                    from = %params.from_account_id,
                    to = %params.to_account_id,
                    "transfer committed"
                );
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                debug!(kind = ?err.kind(), error = %err, "transfer aborted");
                Err(err)
            }
        }
    }

    /// Like [`transfer`](Self::transfer), but gives up at `deadline`. The unit of work
    /// is dropped uncommitted, which rolls it back.
    pub async fn transfer_before(
        &self,
        params: TransferParams,
        deadline: Instant,
    ) -> Result<TransferResult> {
        if Instant::now() >= deadline {
            return Err(BankError::DeadlineExceeded);
        }
        tokio::time::timeout_at(deadline, self.transfer(params))
            .await
            .map_err(|_| BankError::DeadlineExceeded)?
    }

    pub async fn transfer_within(
        &self,
        params: TransferParams,
        timeout: Duration,
    ) -> Result<TransferResult> {
        self.transfer_before(params, Instant::now() + timeout).await
    }
}

async fn execute(tx: &mut dyn LedgerTx, params: &TransferParams) -> Result<TransferResult> {
    let from_id = params.from_account_id;
    let to_id = params.to_account_id;

    let source = tx.get_account(from_id).await?;
    if source.balance < params.from_amount {
        return Err(BankError::InsufficientBalance {
            account_id: from_id,
            balance: source.balance,
            required: params.from_amount,
        });
    }

    let transfer = tx.create_transfer(from_id, to_id, params.from_amount).await?;
    let from_entry = tx.create_entry(from_id, -params.from_amount).await?;
    let to_entry = tx.create_entry(to_id, params.to_amount).await?;

    let (from_account, to_account) = if from_id < to_id {
        let from = tx.add_account_balance(from_id, -params.from_amount).await?;
        let to = tx.add_account_balance(to_id, params.to_amount).await?;
        (from, to)
    } else {
        let to = tx.add_account_balance(to_id, params.to_amount).await?;
        let from = tx.add_account_balance(from_id, -params.from_amount).await?;
        (from, to)
    };
    // Both adjustments hit the same row; the last one is its final state.
    let to_account = if from_id == to_id {
        from_account.clone()
    } else {
        to_account
    };

    // The balance read above was not locked; this one was.
    ensure_not_negative(&from_account, params)?;

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

fn ensure_not_negative(account: &Account, params: &TransferParams) -> Result<()> {
    if account.balance < 0 {
        return Err(BankError::InsufficientBalance {
            account_id: account.id,
            balance: account.balance + params.from_amount,
            required: params.from_amount,
        });
    }
    Ok(())
}
