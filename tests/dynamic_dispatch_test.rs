use simplebank::application::service::{TransferRequest, TransferService};
use simplebank::domain::account::{AccountId, Currency, NewAccount};
use simplebank::domain::ports::{
    LedgerStore, LedgerStoreRef, RateProviderRef, WindowStore, WindowStoreRef,
};
use simplebank::infrastructure::in_memory::{
    InMemoryLedgerStore, InMemoryRateTable, InMemoryWindowStore,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let store: LedgerStoreRef = std::sync::Arc::new(InMemoryLedgerStore::new());
    let rate_table = InMemoryRateTable::new();
    rate_table.set_rate(Currency::new("USD").unwrap(), dec!(1)).await;
    rate_table.set_rate(Currency::new("EUR").unwrap(), dec!(1.1)).await;
    let rates: RateProviderRef = std::sync::Arc::new(rate_table);
    let windows: WindowStoreRef = std::sync::Arc::new(InMemoryWindowStore::new());

    let usd = store
        .create_account(NewAccount::new("alice", Currency::new("USD").unwrap(), 100))
        .await
        .unwrap();
    let eur = store
        .create_account(NewAccount::new("bob", Currency::new("EUR").unwrap(), 0))
        .await
        .unwrap();

    let service = TransferService::new(store.clone(), rates);

    // Verify Send + Sync by spawning tasks
    let transfer_handle = tokio::spawn(async move {
        service
            .transfer(&TransferRequest {
                identity: "alice".into(),
                from_account_id: usd.id,
                to_account_id: eur.id,
                amount: 100,
                currency: Currency::new("USD").unwrap(),
            })
            .await
            .unwrap()
    });

    let window_handle = tokio::spawn(async move {
        windows.add("10.0.0.1:alice:transfer", 1).await.unwrap();
        windows.count("10.0.0.1:alice:transfer").await.unwrap()
    });

    let result = transfer_handle.await.unwrap();
    assert_eq!(result.from_account.balance, 0);
    assert_eq!(result.to_entry.amount, 90);
    assert_eq!(window_handle.await.unwrap(), 1);

    let bob = store.get_account(AccountId(2)).await.unwrap().unwrap();
    assert_eq!(bob.balance, 90);
}
