use clap::Parser;
use miette::{IntoDiagnostic, Result};
use simplebank::application::service::TransferService;
use simplebank::application::throttle::SlidingWindowThrottle;
use simplebank::config::Config;
use simplebank::domain::ports::{LedgerStore, LedgerStoreRef};
use simplebank::infrastructure::in_memory::{
    InMemoryLedgerStore, InMemoryRateTable, InMemoryWindowStore,
};
use simplebank::interfaces::csv::account_writer::AccountWriter;
use simplebank::interfaces::csv::record_reader::RecordReader;
use simplebank::interfaces::csv::records::{AccountRecord, RateRecord, TransferRecord};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();

    let config = Config::parse();
    let store = open_store(&config)?;

    // Seed accounts that the store does not know yet
    let file = File::open(&config.accounts).into_diagnostic()?;
    for record in RecordReader::new(file).records::<AccountRecord>() {
        match record {
            Ok(record) => {
                if store.get_account(record.id).await.into_diagnostic()?.is_none() {
                    store.create_account(record.into()).await.into_diagnostic()?;
                }
            }
            Err(e) => warn!("Error reading account: {}", e),
        }
    }

    let rates = InMemoryRateTable::new();
    if let Some(path) = &config.rates {
        let file = File::open(path).into_diagnostic()?;
        for record in RecordReader::new(file).records::<RateRecord>() {
            match record {
                Ok(record) => rates.set_rate(record.currency, record.rate).await,
                Err(e) => warn!("Error reading rate: {}", e),
            }
        }
    }

    let service = TransferService::new(Arc::clone(&store), Arc::new(rates));
    let throttle = SlidingWindowThrottle::new(Arc::new(InMemoryWindowStore::new()));
    let limits = config.throttle();
    let deadline = config.ledger().transfer_deadline;

    // Process transfer requests
    let file = File::open(&config.transfers).into_diagnostic()?;
    for record in RecordReader::new(file).records::<TransferRecord>() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Error reading transfer: {}", e);
                continue;
            }
        };

        let key = record.rate_limit_key();
        match throttle.check(&key, &limits).await {
            Ok(decision) if !decision.allowed => {
                warn!(
                    key = %key,
                    retry_after_secs = ?decision.retry_after_secs,
                    "Transfer rejected: API limit reached"
                );
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Rate limiter unavailable, rejecting transfer: {}", e);
                continue;
            }
        }

        match service
            .transfer_before(&record.request(), Instant::now() + deadline)
            .await
        {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from = %record.from,
                to = %record.to,
                "Transfer completed"
            ),
            Err(e) => warn!(kind = ?e.kind(), "Error processing transfer: {}", e),
        }
    }

    let accounts = store.list_accounts().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}

fn open_store(config: &Config) -> Result<LedgerStoreRef> {
    let lock_timeout = config.ledger().lock_timeout;

    if let Some(db_path) = &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            use simplebank::infrastructure::rocksdb::RocksDBLedgerStore;

            let store = RocksDBLedgerStore::open_with_lock_timeout(db_path, lock_timeout)
                .into_diagnostic()?;
            return Ok(Arc::new(store));
        }

        #[cfg(not(feature = "storage-rocksdb"))]
        warn!(
            path = %db_path.display(),
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    Ok(Arc::new(InMemoryLedgerStore::with_lock_timeout(lock_timeout)))
}
