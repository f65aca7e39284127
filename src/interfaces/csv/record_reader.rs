use crate::error::{BankError, Result};
use serde::de::DeserializeOwned;
use std::io::Read;

/// Streams typed rows (accounts, rates or transfer requests) out of a CSV file.
///
/// Fields are trimmed and rows may have a ragged length; a short row fails on its own.
pub struct RecordReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// One `Result` per row. A malformed row does not stop the stream.
    pub fn records<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BankError::from))
    }
}
