//! CSV adapters used by the command-line driver.

pub mod account_writer;
pub mod record_reader;
pub mod records;
