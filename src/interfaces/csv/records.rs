use crate::application::service::TransferRequest;
use crate::domain::account::{AccountId, Currency, NewAccount};
use crate::domain::throttle::RateLimitKey;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Operation name under which CSV transfer requests are throttled.
pub const TRANSFER_OPERATION: &str = "transfer";

/// One row of the accounts file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct AccountRecord {
    pub id: AccountId,
    pub owner: String,
    pub currency: Currency,
    pub balance: i64,
}

impl From<AccountRecord> for NewAccount {
    fn from(record: AccountRecord) -> Self {
        NewAccount::new(record.owner, record.currency, record.balance).with_id(record.id)
    }
}

/// One row of the exchange-rates file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct RateRecord {
    pub currency: Currency,
    pub rate: Decimal,
}

/// One row of the transfer requests file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct TransferRecord {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: i64,
    pub currency: Currency,
    pub ip: String,
    pub user: String,
}

impl TransferRecord {
    pub fn rate_limit_key(&self) -> RateLimitKey {
        RateLimitKey::new(self.ip.clone(), self.user.clone(), TRANSFER_OPERATION)
    }

    pub fn request(&self) -> TransferRequest {
        TransferRequest {
            identity: self.user.clone(),
            from_account_id: self.from,
            to_account_id: self.to,
            amount: self.amount,
            currency: self.currency.clone(),
        }
    }
}
