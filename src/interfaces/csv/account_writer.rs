use crate::domain::account::Account;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    id: i64,
    owner: &'a str,
    currency: &'a str,
    balance: i64,
}

/// Writes account snapshots as CSV: `id,owner,currency,balance`.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the accounts sorted by id, header first, and flushes.
    pub fn write_accounts(&mut self, mut accounts: Vec<Account>) -> Result<()> {
        accounts.sort_by_key(|a| a.id);
        if accounts.is_empty() {
            self.writer
                .write_record(["id", "owner", "currency", "balance"])?;
        }
        for account in &accounts {
            self.writer.serialize(AccountRow {
                id: account.id.0,
                owner: &account.owner,
                currency: account.currency.as_str(),
                balance: account.balance,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
