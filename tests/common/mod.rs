#![allow(dead_code)]

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use simplebank::domain::account::{Account, AccountId, Currency, NewAccount};
use simplebank::domain::ports::{LedgerStore, LedgerStoreRef, LedgerTx, LedgerTxBox};
use simplebank::domain::transfer::{Entry, Transfer};
use simplebank::error::{BankError, Result};
use std::sync::{Arc, Mutex};

pub fn random_owner() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

pub fn random_balance() -> i64 {
    thread_rng().gen_range(100..1_000)
}

pub fn usd() -> Currency {
    Currency::new("USD").unwrap()
}

/// Creates an account with a random owner and a random positive USD balance.
pub async fn create_random_account(store: &dyn LedgerStore) -> Account {
    store
        .create_account(NewAccount::new(random_owner(), usd(), random_balance()))
        .await
        .unwrap()
}

pub async fn create_account(store: &dyn LedgerStore, currency: &str, balance: i64) -> Account {
    store
        .create_account(NewAccount::new(
            random_owner(),
            Currency::new(currency).unwrap(),
            balance,
        ))
        .await
        .unwrap()
}

pub async fn balance(store: &dyn LedgerStore, id: AccountId) -> i64 {
    store.get_account(id).await.unwrap().unwrap().balance
}

/// Wraps a ledger store, recording the order of balance adjustments and optionally
/// failing the adjustment of one account.
#[derive(Clone)]
pub struct RecordingStore {
    inner: LedgerStoreRef,
    adjusted: Arc<Mutex<Vec<AccountId>>>,
    fail_on: Option<AccountId>,
}

impl RecordingStore {
    pub fn new(inner: LedgerStoreRef) -> Self {
        Self {
            inner,
            adjusted: Arc::new(Mutex::new(Vec::new())),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, id: AccountId) -> Self {
        self.fail_on = Some(id);
        self
    }

    /// Accounts passed to `add_account_balance`, in call order.
    pub fn adjusted(&self) -> Vec<AccountId> {
        self.adjusted.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.adjusted.lock().unwrap().clear();
    }
}

#[async_trait]
impl LedgerStore for RecordingStore {
    async fn begin(&self) -> Result<LedgerTxBox> {
        Ok(Box::new(RecordingTx {
            inner: self.inner.begin().await?,
            adjusted: Arc::clone(&self.adjusted),
            fail_on: self.fail_on,
        }))
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account> {
        self.inner.create_account(account).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        self.inner.get_account(id).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.inner.list_accounts().await
    }

    async fn list_entries(&self, account_id: AccountId) -> Result<Vec<Entry>> {
        self.inner.list_entries(account_id).await
    }

    async fn list_transfers(&self, account_id: AccountId) -> Result<Vec<Transfer>> {
        self.inner.list_transfers(account_id).await
    }
}

struct RecordingTx {
    inner: LedgerTxBox,
    adjusted: Arc<Mutex<Vec<AccountId>>>,
    fail_on: Option<AccountId>,
}

#[async_trait]
impl LedgerTx for RecordingTx {
    async fn get_account(&mut self, id: AccountId) -> Result<Account> {
        self.inner.get_account(id).await
    }

    async fn create_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<Transfer> {
        self.inner.create_transfer(from, to, amount).await
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: i64) -> Result<Entry> {
        self.inner.create_entry(account_id, amount).await
    }

    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> Result<Account> {
        self.adjusted.lock().unwrap().push(id);
        if self.fail_on == Some(id) {
            return Err(BankError::storage(format!("injected failure on account {}", id)));
        }
        self.inner.add_account_balance(id, delta).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}
