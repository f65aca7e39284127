use super::account::{Account, AccountId, Currency, NewAccount};
use super::transfer::{Entry, Transfer};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Durable source of truth for accounts, transfers and entries.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a unit of work. Dropping the returned handle without committing rolls it back.
    async fn begin(&self) -> Result<LedgerTxBox>;
    async fn create_account(&self, account: NewAccount) -> Result<Account>;
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>>;
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    async fn list_entries(&self, account_id: AccountId) -> Result<Vec<Entry>>;
    async fn list_transfers(&self, account_id: AccountId) -> Result<Vec<Transfer>>;
}

/// One atomic unit of work against a [`LedgerStore`].
///
/// Writes are invisible to other units of work until `commit`. `add_account_balance`
/// takes the row's write lock and holds it until the unit of work ends.
#[async_trait]
pub trait LedgerTx: Send {
    /// Reads an account, including this unit of work's own uncommitted adjustments.
    async fn get_account(&mut self, id: AccountId) -> Result<Account>;
    async fn create_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<Transfer>;
    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> Result<Entry>;
    /// Adds `delta` to the balance and returns the updated row.
    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> Result<Account>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Exchange-rate lookup, in a common reference unit.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fails with `BankError::RateNotFound` when the currency is unknown.
    async fn get_rate(&self, currency: &Currency) -> Result<Decimal>;
}

/// Shared ordered log of request timestamps, one log per key.
///
/// Each method is expected to be atomic on its own; the throttle does not assume the
/// sequence of calls is.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Removes every timestamp strictly less than `min_ms`.
    async fn remove_before(&self, key: &str, min_ms: i64) -> Result<()>;
    async fn count(&self, key: &str) -> Result<u64>;
    /// Returns up to `n` timestamps, oldest first.
    async fn first(&self, key: &str, n: usize) -> Result<Vec<i64>>;
    async fn add(&self, key: &str, timestamp_ms: i64) -> Result<()>;
    /// Sets the time-to-live of the whole log.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub type LedgerTxBox = Box<dyn LedgerTx>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type RateProviderRef = Arc<dyn RateProvider>;
pub type WindowStoreRef = Arc<dyn WindowStore>;
pub type ClockRef = Arc<dyn Clock>;
