use crate::domain::account::AccountId;
use thiserror::Error;

/// Coarse classification of a [`BankError`], used by callers to pick a
/// response status or a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any mutation.
    Validation,
    /// A domain rule (insufficient balance) aborted the unit of work.
    BusinessRule,
    /// A referenced account or exchange rate does not exist.
    NotFound,
    /// The caller is not allowed to act on the account.
    Unauthorized,
    /// Storage, lock-wait or deadline failure. The whole operation was rolled back.
    Transient,
    /// Local I/O or parsing failure outside the core components.
    Interface,
}

#[derive(Error, Debug)]
pub enum BankError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("insufficient balance on account {account_id}: balance {balance}, required {required}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: i64,
        required: i64,
    },
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("account {account_id} doesn't belong to user '{identity}'")]
    NotAccountOwner {
        account_id: AccountId,
        identity: String,
    },
    #[error("exchange rate for {0} not found")]
    RateNotFound(String),
    #[error("timed out waiting for row lock on account {0}")]
    LockTimeout(AccountId),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BankError {
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InsufficientBalance { .. } => ErrorKind::BusinessRule,
            Self::AccountNotFound(_) | Self::RateNotFound(_) => ErrorKind::NotFound,
            Self::NotAccountOwner { .. } => ErrorKind::Unauthorized,
            Self::LockTimeout(_) | Self::DeadlineExceeded | Self::Storage(_) => {
                ErrorKind::Transient
            }
            Self::Csv(_) | Self::Io(_) => ErrorKind::Interface,
        }
    }

    /// Only transient failures are safe to retry: nothing of the failed attempt is visible.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BankError {
    fn from(err: rocksdb::Error) -> Self {
        Self::storage(err)
    }
}

impl From<serde_json::Error> for BankError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(err)
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
