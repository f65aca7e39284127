use super::locks::{RowGuards, RowLocks};
use super::{Sequences, next_id};
use crate::domain::account::{Account, AccountId, NewAccount};
use crate::domain::ports::{LedgerStore, LedgerTx, LedgerTxBox};
use crate::domain::transfer::{Entry, Transfer};
use crate::error::{BankError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Column Family for account rows, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for transfers, keyed by transfer id.
pub const CF_TRANSFERS: &str = "transfers";
/// Column Family for entries, keyed by account id then entry id.
pub const CF_ENTRIES: &str = "entries";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const SEQ_ACCOUNT: &[u8] = b"seq:account";
const SEQ_TRANSFER: &[u8] = b"seq:transfer";
const SEQ_ENTRY: &[u8] = b"seq:entry";

/// A persistent ledger backed by RocksDB.
///
/// Accounts, transfers and entries live in separate Column Families; entries are
/// keyed by account first so one account's ledger lines are a contiguous range.
///
/// Every unit of work is staged in memory and written as one `WriteBatch`, which
/// RocksDB applies atomically. Balance rows are protected by in-process row locks,
/// so a single process must own the database directory.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`, the id
/// sequences and the row locks).
#[derive(Clone)]
pub struct RocksDBLedgerStore {
    db: Arc<DB>,
    sequences: Arc<Sequences>,
    locks: RowLocks,
    create_lock: Arc<Mutex<()>>,
}

impl RocksDBLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("accounts", "transfers", "entries"
    /// and "meta") exist, and resumes id sequences past every committed id.
    /// Row-lock waits use [`DEFAULT_LOCK_TIMEOUT`](super::locks::DEFAULT_LOCK_TIMEOUT).
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, super::locks::DEFAULT_LOCK_TIMEOUT)
    }

    /// Like [`open`](Self::open), with an explicit row-lock wait bound.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    /// * `lock_timeout` - How long a unit of work waits for another one's row lock
    ///   before failing with `BankError::LockTimeout`.
    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ACCOUNTS, CF_TRANSFERS, CF_ENTRIES, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        // A stored sequence can lag behind the rows when two commits race on
        // writing it, so it never resumes below the largest committed id.
        let sequences = Sequences::default();
        {
            let meta = cf(&db, CF_META)?;
            for (key, seq, cf_name, id_offset) in [
                (SEQ_ACCOUNT, &sequences.account, CF_ACCOUNTS, 0),
                (SEQ_TRANSFER, &sequences.transfer, CF_TRANSFERS, 0),
                (SEQ_ENTRY, &sequences.entry, CF_ENTRIES, 8),
            ] {
                let stored = match db.get_cf(meta, key)? {
                    Some(bytes) => decode_i64(&bytes)?,
                    None => 0,
                };
                let committed = max_committed_id(&db, cf_name, id_offset)?;
                seq.store(stored.max(committed), Ordering::SeqCst);
            }
        }

        Ok(Self {
            db: Arc::new(db),
            sequences: Arc::new(sequences),
            locks: RowLocks::new(lock_timeout),
            create_lock: Arc::new(Mutex::new(())),
        })
    }
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        BankError::storage(format!("{} column family not found", name))
    })
}

fn decode_i64(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| BankError::storage("corrupt id value"))?;
    Ok(i64::from_be_bytes(raw))
}

/// Largest id stored in `cf_name`, read from the 8 key bytes at `id_offset`.
fn max_committed_id(db: &DB, cf_name: &str, id_offset: usize) -> Result<i64> {
    let mut max = 0;
    for item in db.iterator_cf(cf(db, cf_name)?, IteratorMode::Start) {
        let (key, _value) = item?;
        let id = decode_i64(key.get(id_offset..).unwrap_or_default())?;
        max = max.max(id);
    }
    Ok(max)
}

fn entry_key(account_id: AccountId, entry_id: i64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&account_id.0.to_be_bytes());
    key[8..].copy_from_slice(&entry_id.to_be_bytes());
    key
}

fn read_json<T: DeserializeOwned>(db: &DB, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
    match db.get_cf(cf(db, cf_name)?, key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn put_json<T: Serialize>(db: &DB, batch: &mut WriteBatch, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
    batch.put_cf(cf(db, cf_name)?, key, serde_json::to_vec(value)?);
    Ok(())
}

fn put_sequence(db: &DB, batch: &mut WriteBatch, key: &[u8], seq: &AtomicI64) -> Result<()> {
    batch.put_cf(cf(db, CF_META)?, key, seq.load(Ordering::SeqCst).to_be_bytes());
    Ok(())
}

fn load_account(db: &DB, id: AccountId) -> Result<Account> {
    read_json(db, CF_ACCOUNTS, &id.0.to_be_bytes())?.ok_or(BankError::AccountNotFound(id))
}

#[async_trait]
impl LedgerStore for RocksDBLedgerStore {
    async fn begin(&self) -> Result<LedgerTxBox> {
        Ok(Box::new(RocksDBLedgerTx {
            db: Arc::clone(&self.db),
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
        let _guard = self.create_lock.lock().await;

        let id = match account.id {
            Some(id) => {
                if read_json::<Account>(&self.db, CF_ACCOUNTS, &id.0.to_be_bytes())?.is_some() {
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

        let mut batch = WriteBatch::default();
        put_json(&self.db, &mut batch, CF_ACCOUNTS, &id.0.to_be_bytes(), &created)?;
        put_sequence(&self.db, &mut batch, SEQ_ACCOUNT, &self.sequences.account)?;
        self.db.write(batch)?;
        Ok(created)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        read_json(&self.db, CF_ACCOUNTS, &id.0.to_be_bytes())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let handle = cf(&self.db, CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            accounts.push(serde_json::from_slice(&value)?);
        }
        Ok(accounts)
    }

    async fn list_entries(&self, account_id: AccountId) -> Result<Vec<Entry>> {
        let handle = cf(&self.db, CF_ENTRIES)?;
        let prefix = account_id.0.to_be_bytes();
        let mut entries = Vec::new();
        for item in self
            .db
            .iterator_cf(handle, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    async fn list_transfers(&self, account_id: AccountId) -> Result<Vec<Transfer>> {
        let handle = cf(&self.db, CF_TRANSFERS)?;
        let mut transfers = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            let transfer: Transfer = serde_json::from_slice(&value)?;
            if transfer.from_account_id == account_id || transfer.to_account_id == account_id {
                transfers.push(transfer);
            }
        }
        Ok(transfers)
    }
}

/// Unit of work of a [`RocksDBLedgerStore`].
///
/// Reads go straight to the database; writes are staged and only reach it in
/// `commit`. Dropping it without committing discards the staged writes and
/// releases its row locks.
pub struct RocksDBLedgerTx {
    db: Arc<DB>,
    sequences: Arc<Sequences>,
    locks: RowLocks,
    guards: RowGuards,
    deltas: BTreeMap<AccountId, i64>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
}

#[async_trait]
impl LedgerTx for RocksDBLedgerTx {
    async fn get_account(&mut self, id: AccountId) -> Result<Account> {
        let mut account = load_account(&self.db, id)?;
        if let Some(delta) = self.deltas.get(&id) {
            account.balance += delta;
        }
        Ok(account)
    }

    async fn create_transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<Transfer> {
        load_account(&self.db, from)?;
        load_account(&self.db, to)?;
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
        load_account(&self.db, account_id)?;
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
        load_account(&self.db, id)?;
        self.locks.acquire(&mut self.guards, id).await?;

        let account = self.get_account(id).await?;
        let balance = account.balance.checked_add(delta).ok_or_else(|| {
            BankError::Validation(format!("balance overflow on account {}", id))
        })?;

        *self.deltas.entry(id).or_insert(0) += delta;
        Ok(Account { balance, ..account })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let db = &self.db;
        let mut batch = WriteBatch::default();

        for (id, delta) in &self.deltas {
            let mut account = load_account(db, *id)?;
            account.balance += delta;
            put_json(db, &mut batch, CF_ACCOUNTS, &id.0.to_be_bytes(), &account)?;
        }
        for transfer in &self.transfers {
            put_json(db, &mut batch, CF_TRANSFERS, &transfer.id.to_be_bytes(), transfer)?;
        }
        for entry in &self.entries {
            put_json(db, &mut batch, CF_ENTRIES, &entry_key(entry.account_id, entry.id), entry)?;
        }
        if !self.transfers.is_empty() {
            put_sequence(db, &mut batch, SEQ_TRANSFER, &self.sequences.transfer)?;
        }
        if !self.entries.is_empty() {
            put_sequence(db, &mut batch, SEQ_ENTRY, &self.sequences.entry)?;
        }

        db.write(batch)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
