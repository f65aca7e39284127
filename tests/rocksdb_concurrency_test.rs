#![cfg(feature = "storage-rocksdb")]

mod common;

use common::{balance, create_account};
use simplebank::application::engine::TransferEngine;
use simplebank::domain::ports::LedgerStore;
use simplebank::domain::transfer::TransferParams;
use simplebank::error::BankError;
use simplebank::infrastructure::rocksdb::RocksDBLedgerStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rocksdb_opposing_transfers_do_not_deadlock() {
    let dir = tempdir().unwrap();
    let store = RocksDBLedgerStore::open(dir.path()).unwrap();
    let account1 = create_account(&store, "USD", 500).await;
    let account2 = create_account(&store, "USD", 500).await;
    let engine = TransferEngine::new(Arc::new(store.clone()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let (from, to) = if i % 2 == 1 {
            (account2.id, account1.id)
        } else {
            (account1.id, account2.id)
        };
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .transfer_within(TransferParams::new(from, to, 10), Duration::from_secs(5))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(balance(&store, account1.id).await, 500);
    assert_eq!(balance(&store, account2.id).await, 500);
    assert_eq!(store.list_transfers(account1.id).await.unwrap().len(), 10);
    assert_eq!(store.list_entries(account1.id).await.unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rocksdb_concurrent_overdraw_never_goes_negative() {
    let dir = tempdir().unwrap();
    let store = RocksDBLedgerStore::open(dir.path()).unwrap();
    let source = create_account(&store, "USD", 100).await;
    let sink = create_account(&store, "USD", 0).await;
    let engine = TransferEngine::new(Arc::new(store.clone()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        let params = TransferParams::new(source.id, sink.id, 30);
        handles.push(tokio::spawn(async move { engine.transfer(params).await }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(result) => {
                assert!(result.from_account.balance >= 0);
                succeeded += 1;
            }
            Err(e) => assert!(matches!(e, BankError::InsufficientBalance { .. })),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(balance(&store, source.id).await, 10);
    assert_eq!(balance(&store, sink.id).await, 90);
    assert_eq!(store.list_transfers(source.id).await.unwrap().len(), 3);
    assert_eq!(store.list_entries(sink.id).await.unwrap().len(), 3);
}
