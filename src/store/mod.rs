//! Persistent stores

pub mod records;

pub use records::{PlayerRecord, RecordStore};
