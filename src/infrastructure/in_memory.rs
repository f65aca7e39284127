use super::clock::SystemClock;
use super::locks::{RowGuards, RowLocks};
use super::{Sequences, next_id};
use crate::domain::account::{Account, AccountId, Currency, NewAccount};
use crate::domain::ports::{
    ClockRef, LedgerStore, LedgerTx, LedgerTxBox, RateProvider, WindowStore,
};
use crate::domain::transfer::{Entry, Transfer};
use crate::error::{BankError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
}

impl LedgerState {
    fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts.get(&id).ok_or(BankError::AccountNotFound(id))
    }
}

/// A thread-safe in-memory ledger with row-level write locks.
///
/// Committed state sits behind one `RwLock` and is replaced atomically on commit.
/// Uncommitted writes live in the unit of work, so dropping it is a rollback.
/// Ids are never reused, including ids handed out to rolled-back writes.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    sequences: Arc<Sequences>,
    locks: RowLocks,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how long a unit of work waits for another one's row lock.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            locks: RowLocks::new(lock_timeout),
            ..Self::default()
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<LedgerTxBox> {
        Ok(Box::new(InMemoryLedgerTx {
            state: Arc::clone(&self.state),
            sequences: Arc::clone(&self.sequences),
            locks: self.locks.clone(),
            guards: RowGuards::default(),
            deltas: BTreeMap::new(),
            transfers: Vec::new(),
            entries: Vec::new(),
        }))
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account> {
        account.validate()?;
        let mut state = self.state.write().await;

        let id = match account.id {
            Some(id) => {
                if state.accounts.contains_key(&id) {
                    return Err(BankError::Validation(format!(
                        "account {} already exists",
                        id
                    )));
                }
                self.sequences.account.fetch_max(id.0, Ordering::SeqCst);
                id
            }
            None => AccountId(next_id(&self.sequences.account)),
        };

        let created = Account {
            id,
            owner: account.owner,
            currency: account.currency,
            balance: account.balance,
            created_at: Utc::now(),
        };
        state.accounts.insert(id, created.clone());
        Ok(created)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }

    async fn list_entries(&self, account_id: AccountId) -> Result<Vec<Entry>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn list_transfers(&self, account_id: AccountId) -> Result<Vec<Transfer>> {
        let state = self.state.read().await;
        Ok(state
            .transfers
            .iter()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .cloned()
            .collect())
    }
}

/// Unit of work of an [`InMemoryLedgerStore`].
pub struct InMemoryLedgerTx {
    state: Arc<RwLock<LedgerState>>,
    sequences: Arc<Sequences>,
    locks: RowLocks,
    guards: RowGuards,
    deltas: BTreeMap<AccountId, i64>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
}

impl InMemoryLedgerTx {
    fn apply_delta(&self, mut account: Account) -> Account {
        if let Some(delta) = self.deltas.get(&account.id) {
            account.balance += delta;
        }
        account
    }
}

#[async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn get_account(&mut self, id: AccountId) -> Result<Account> {
        let account = self.state.read().await.account(id)?.clone();
        Ok(self.apply_delta(account))
    }

    async fn create_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<Transfer> {
        {
            let state = self.state.read().await;
            state.account(from)?;
            state.account(to)?;
        }
        let transfer = Transfer {
            id: next_id(&self.sequences.transfer),
            from_account_id: from,
            to_account_id: to,
            amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> Result<Entry> {
        self.state.read().await.account(account_id)?;
        let entry = Entry {
            id: next_id(&self.sequences.entry),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> Result<Account> {
        self.state.read().await.account(id)?;
        self.locks.acquire(&mut self.guards, id).await?;

        // The row is ours now: no other unit of work can commit a change to it.
        let account = self.get_account(id).await?;
        let balance = account.balance.checked_add(delta).ok_or_else(|| {
            BankError::Validation(format!("balance overflow on account {}", id))
        })?;

        *self.deltas.entry(id).or_insert(0) += delta;
        Ok(Account { balance, ..account })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut state = this.state.write().await;

        for id in this.deltas.keys() {
            state.account(*id)?;
        }
        for (id, delta) in &this.deltas {
            if let Some(account) = state.accounts.get_mut(id) {
                account.balance += delta;
            }
        }
        state.transfers.extend(this.transfers);
        state.entries.extend(this.entries);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Exchange rates held in memory.
#[derive(Default, Clone)]
pub struct InMemoryRateTable {
    rates: Arc<RwLock<HashMap<Currency, Decimal>>>,
}

impl InMemoryRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rate(&self, currency: Currency, rate: Decimal) {
        self.rates.write().await.insert(currency, rate);
    }
}

#[async_trait]
impl RateProvider for InMemoryRateTable {
    async fn get_rate(&self, currency: &Currency) -> Result<Decimal> {
        let rates = self.rates.read().await;
        rates
            .get(currency)
            .copied()
            .ok_or_else(|| BankError::RateNotFound(currency.to_string()))
    }
}

#[derive(Default)]
struct WindowLog {
    /// Sorted ascending. Duplicates are kept: two requests in one millisecond are two requests.
    stamps: Vec<i64>,
    expires_at_ms: Option<i64>,
}

impl WindowLog {
    /// A log is still live at its expiry instant, like a timestamp exactly one
    /// window old still counts.
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|at| at < now_ms)
    }
}

/// An in-process stand-in for a shared sorted-set store.
///
/// Each operation runs under one mutex, so each is atomic; sequences of
/// operations are not. Key expiry is evaluated lazily against the clock.
#[derive(Clone)]
pub struct InMemoryWindowStore {
    logs: Arc<Mutex<HashMap<String, WindowLog>>>,
    clock: ClockRef,
}

impl Default for InMemoryWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: ClockRef) -> Self {
        Self {
            logs: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Keys that currently hold a live, non-expired log.
    pub async fn live_keys(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut logs = self.logs.lock().await;
        logs.retain(|_, log| !log.is_expired(now));
        logs.keys().cloned().collect()
    }

    async fn with_log<T>(&self, key: &str, f: impl FnOnce(Option<&mut WindowLog>) -> T) -> T {
        let now = self.clock.now_ms();
        let mut logs = self.logs.lock().await;
        if logs.get(key).is_some_and(|log| log.is_expired(now)) {
            logs.remove(key);
        }
        f(logs.get_mut(key))
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn remove_before(&self, key: &str, min_ms: i64) -> Result<()> {
        self.with_log(key, |log| {
            if let Some(log) = log {
                let cut = log.stamps.partition_point(|&ts| ts < min_ms);
                log.stamps.drain(..cut);
            }
        })
        .await;
        Ok(())
    }

    async fn count(&self, key: &str) -> Result<u64> {
        Ok(self
            .with_log(key, |log| log.map_or(0, |log| log.stamps.len() as u64))
            .await)
    }

    async fn first(&self, key: &str, n: usize) -> Result<Vec<i64>> {
        Ok(self
            .with_log(key, |log| {
                log.map(|log| log.stamps.iter().take(n).copied().collect())
                    .unwrap_or_default()
            })
            .await)
    }

    async fn add(&self, key: &str, timestamp_ms: i64) -> Result<()> {
        let now = self.clock.now_ms();
        let mut logs = self.logs.lock().await;
        if logs.get(key).is_some_and(|log| log.is_expired(now)) {
            logs.remove(key);
        }
        let log = logs.entry(key.to_string()).or_default();
        let at = log.stamps.partition_point(|&ts| ts <= timestamp_ms);
        log.stamps.insert(at, timestamp_ms);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let now = self.clock.now_ms();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.with_log(key, |log| {
            if let Some(log) = log {
                log.expires_at_ms = Some(now.saturating_add(ttl_ms));
            }
        })
        .await;
        Ok(())
    }
}
