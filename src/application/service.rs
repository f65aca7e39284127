use super::engine::TransferEngine;
use super::exchange::CurrencyExchange;
use crate::domain::account::{Account, AccountId, Currency};
use crate::domain::ports::{LedgerStoreRef, RateProviderRef};
use crate::domain::transfer::{TransferParams, TransferResult};
use crate::error::{BankError, Result};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A transfer as requested by a customer: an amount in the source account's currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Authenticated user making the request. Must own the source account.
    pub identity: String,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub currency: Currency,
}

/// The caller side of a transfer: validates the request, resolves both accounts,
/// checks that the caller owns the source, converts the credited amount, then hands the two amounts to [`TransferEngine`].
#[derive(Clone)]
pub struct TransferService {
    engine: TransferEngine,
    exchange: CurrencyExchange,
}

impl TransferService {
    pub fn new(store: LedgerStoreRef, rates: RateProviderRef) -> Self {
        Self {
            engine: TransferEngine::new(store),
            exchange: CurrencyExchange::new(rates),
        }
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    pub async fn prepare(&self, request: &TransferRequest) -> Result<TransferParams> {
        if request.amount <= 0 {
            return Err(BankError::Validation(
                "transfer amount must be positive".into(),
            ));
        }

        let from = self.account(request.from_account_id).await?;
        if from.currency != request.currency {
            return Err(BankError::Validation(format!(
                "account [{}] currency mismatch: {} vs {}",
                from.id, from.currency, request.currency
            )));
        }
        if from.owner != request.identity {
            return Err(BankError::NotAccountOwner {
                account_id: from.id,
                identity: request.identity.clone(),
            });
        }
        let to = self.account(request.to_account_id).await?;

        let to_amount = self
            .exchange
            .convert(&from.currency, &to.currency, request.amount)
            .await?;

        Ok(TransferParams::new(from.id, to.id, request.amount).with_to_amount(to_amount))
    }

    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferResult> {
        let params = self.prepare(request).await?;
        self.engine.transfer(params).await
    }

    pub async fn transfer_before(
        &self,
        request: &TransferRequest,
        deadline: Instant,
    ) -> Result<TransferResult> {
        if Instant::now() >= deadline {
            return Err(BankError::DeadlineExceeded);
        }
        let params = tokio::time::timeout_at(deadline, self.prepare(request))
            .await
            .map_err(|_| BankError::DeadlineExceeded)??;
        self.engine.transfer_before(params, deadline).await
    }

    async fn account(&self, id: AccountId) -> Result<Account> {
        self.engine
            .store()
            .get_account(id)
            .await?
            .ok_or(BankError::AccountNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::NewAccount;
    use crate::domain::ports::LedgerStore;
    use crate::error::ErrorKind;
    use crate::infrastructure::in_memory::{InMemoryLedgerStore, InMemoryRateTable};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn code(c: &str) -> Currency {
        Currency::new(c).unwrap()
    }

    async fn setup() -> (InMemoryLedgerStore, TransferService, AccountId, AccountId, AccountId) {
        let store = InMemoryLedgerStore::new();
        let usd1 = store
            .create_account(NewAccount::new("alice", code("USD"), 1_000))
            .await
            .unwrap();
        let usd2 = store
            .create_account(NewAccount::new("bob", code("USD"), 0))
            .await
            .unwrap();
        let eur = store
            .create_account(NewAccount::new("carol", code("EUR"), 0))
            .await
            .unwrap();

        let rates = InMemoryRateTable::new();
        rates.set_rate(code("USD"), dec!(1)).await;
        rates.set_rate(code("EUR"), dec!(1.1)).await;

        let service = TransferService::new(Arc::new(store.clone()), Arc::new(rates));
        (store, service, usd1.id, usd2.id, eur.id)
    }

    #[tokio::test]
    async fn test_same_currency_request() {
        let (_store, service, a, b, _) = setup().await;
        let result = service
            .transfer(&TransferRequest {
                identity: "alice".into(),
                from_account_id: a,
                to_account_id: b,
                amount: 250,
                currency: code("USD"),
            })
            .await
            .unwrap();
        assert_eq!(result.from_account.balance, 750);
        assert_eq!(result.to_account.balance, 250);
    }

    #[tokio::test]
    async fn test_cross_currency_request_floors_credit() {
        let (store, service, a, _, eur) = setup().await;
        let result = service
            .transfer(&TransferRequest {
                identity: "alice".into(),
                from_account_id: a,
                to_account_id: eur,
                amount: 100,
                currency: code("USD"),
            })
            .await
            .unwrap();
        assert_eq!(result.transfer.amount, 100);
        assert_eq!(result.to_entry.amount, 90);
        assert_eq!(store.get_account(eur).await.unwrap().unwrap().balance, 90);
    }

    #[tokio::test]
    async fn test_currency_mismatch_is_validation() {
        let (_store, service, a, b, _) = setup().await;
        let err = service
            .transfer(&TransferRequest {
                identity: "alice".into(),
                from_account_id: a,
                to_account_id: b,
                amount: 1,
                currency: code("EUR"),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_foreign_source_account_is_rejected() {
        let (store, service, a, b, _) = setup().await;
        let err = service
            .transfer(&TransferRequest {
                identity: "bob".into(),
                from_account_id: a,
                to_account_id: b,
                amount: 100,
                currency: code("USD"),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            BankError::NotAccountOwner { account_id, identity }
                if *account_id == a && identity == "bob"
        ));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(store.get_account(a).await.unwrap().unwrap().balance, 1_000);
        assert!(store.list_transfers(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_accounts_are_not_found() {
        let (_store, service, a, _, _) = setup().await;
        let err = service
            .transfer(&TransferRequest {
                identity: "alice".into(),
                from_account_id: a,
                to_account_id: AccountId(404),
                amount: 1,
                currency: code("USD"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::AccountNotFound(AccountId(404))));

        let err = service
            .transfer(&TransferRequest {
                identity: "alice".into(),
                from_account_id: AccountId(405),
                to_account_id: a,
                amount: 1,
                currency: code("USD"),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_missing_rate_writes_nothing() {
        let store = InMemoryLedgerStore::new();
        let a = store
            .create_account(NewAccount::new("alice", code("USD"), 100))
            .await
            .unwrap();
        let b = store
            .create_account(NewAccount::new("bob", code("GBP"), 0))
            .await
            .unwrap();
        let service = TransferService::new(
            Arc::new(store.clone()),
            Arc::new(InMemoryRateTable::new()),
        );

        let err = service
            .transfer(&TransferRequest {
                identity: "alice".into(),
                from_account_id: a.id,
                to_account_id: b.id,
                amount: 10,
                currency: code("USD"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::RateNotFound(_)));
        assert_eq!(store.get_account(a.id).await.unwrap().unwrap().balance, 100);
    }
}
