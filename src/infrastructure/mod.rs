//! Storage adapters for the domain ports.

pub mod clock;
pub mod in_memory;
pub mod locks;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

use std::sync::atomic::{AtomicI64, Ordering};

/// Last-issued ids. The next id is always `last + 1`.
#[derive(Default)]
pub(crate) struct Sequences {
    pub(crate) account: AtomicI64,
    pub(crate) transfer: AtomicI64,
    pub(crate) entry: AtomicI64,
}

pub(crate) fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}
