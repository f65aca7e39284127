use super::account::{Account, AccountId};
use crate::error::{BankError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Money moved from one account to another. `amount` is the debited amount,
/// in the source account's currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// A signed ledger line against a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Input of a single transfer. `to_amount` differs from `from_amount` only when a
/// currency conversion was applied upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub from_amount: i64,
    pub to_amount: i64,
}

impl TransferParams {
    /// Same-currency transfer: both sides move the same amount.
    pub fn new(from: AccountId, to: AccountId, amount: i64) -> Self {
        Self {
            from_account_id: from,
            to_account_id: to,
            from_amount: amount,
            to_amount: amount,
        }
    }

    pub fn with_to_amount(mut self, to_amount: i64) -> Self {
        self.to_amount = to_amount;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.from_amount <= 0 {
            return Err(BankError::Validation(
                "transfer amount must be positive".into(),
            ));
        }
        if self.to_amount < 0 {
            return Err(BankError::Validation(
                "credited amount must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Everything a successful transfer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validation() {
        let ok = TransferParams::new(AccountId(1), AccountId(2), 10);
        assert!(ok.validate().is_ok());

        let zero = TransferParams::new(AccountId(1), AccountId(2), 0);
        assert!(matches!(zero.validate(), Err(BankError::Validation(_))));

        let negative = TransferParams::new(AccountId(1), AccountId(2), -5);
        assert!(matches!(negative.validate(), Err(BankError::Validation(_))));

        let bad_credit = ok.with_to_amount(-1);
        assert!(bad_credit.validate().is_err());
    }

    #[test]
    fn test_converted_amount_is_kept() {
        let params = TransferParams::new(AccountId(1), AccountId(2), 100).with_to_amount(91);
        assert_eq!(params.from_amount, 100);
        assert_eq!(params.to_amount, 91);
    }
}
