use crate::error::{BankError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary identifier of an account.
///
/// The derived `Ord` is the global lock-acquisition order: every path that writes
/// two balances in one unit of work must lock the smaller id first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// An ISO-4217 style currency code, e.g. `USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(code))
        } else {
            Err(BankError::Validation(format!(
                "invalid currency code '{}'",
                code
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A customer account. The balance is kept in the smallest currency unit.
///
/// Balances change only through `LedgerTx::add_account_balance` inside a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub currency: Currency,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Arguments for opening an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Requested id. `None` lets the store allocate one.
    pub id: Option<AccountId>,
    pub owner: String,
    pub currency: Currency,
    pub balance: i64,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, currency: Currency, balance: i64) -> Self {
        Self {
            id: None,
            owner: owner.into(),
            currency,
            balance,
        }
    }

    pub fn with_id(mut self, id: AccountId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(BankError::Validation("owner must not be empty".into()));
        }
        if self.balance < 0 {
            return Err(BankError::Validation(
                "opening balance must not be negative".into(),
            ));
        }
        Ok(())
    }
}
