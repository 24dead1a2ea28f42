//! Durable reading storage on sled.
//!
//! Readings are append-only. Each is stored once in the `readings` tree
//! under a key that sorts by device, then observation time, then insertion
//! id, so latest and range queries are prefix scans. A `devices` tree keeps
//! the newest observation time seen per device.

mod key;
mod store;

pub use key::ReadingKey;
pub use store::{DeviceSummary, ReadingStore, StoredReading};
