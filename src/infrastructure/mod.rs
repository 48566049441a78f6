//! Adapters behind the domain ports: record stores, the signing authority
//! and clocks.

pub mod clock;
pub mod csv_file;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod signing;
