use crate::domain::account::AccountId;
use crate::error::{BankError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type RowLock = Arc<tokio::sync::Mutex<()>>;

/// Per-account exclusive write locks shared by every unit of work of one store.
///
/// Waiting for a row is bounded by `wait_timeout`, after which the caller gets
/// `BankError::LockTimeout` and is expected to roll back.
#[derive(Clone)]
pub struct RowLocks {
    rows: Arc<Mutex<HashMap<AccountId, RowLock>>>,
    wait_timeout: Duration,
}

impl Default for RowLocks {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl RowLocks {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            wait_timeout,
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Acquires the write lock on `id` into `guards`. Re-acquiring a row already
    /// held by the same unit of work is a no-op.
    pub async fn acquire(&self, guards: &mut RowGuards, id: AccountId) -> Result<()> {
        if guards.held.contains_key(&id) {
            return Ok(());
        }

        let row = {
            let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            rows.entry(id).or_default().clone()
        };

        let guard = tokio::time::timeout(self.wait_timeout, row.lock_owned())
            .await
            .map_err(|_| BankError::LockTimeout(id))?;
        guards.held.insert(id, guard);
        Ok(())
    }
}

/// Row locks held by one unit of work. Dropping it releases every row.
#[derive(Default)]
pub struct RowGuards {
    held: BTreeMap<AccountId, OwnedMutexGuard<()>>,
}

impl RowGuards {
    pub fn holds(&self, id: AccountId) -> bool {
        self.held.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}
