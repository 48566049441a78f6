use crate::domain::drug::Drug;
use crate::domain::ports::{Record, RecordStore};
use crate::domain::prescription::Prescription;
use crate::domain::transaction::Transaction;
use crate::domain::user::User;
use crate::error::{PharmacyError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// Column families, one per record collection.
pub const COLLECTIONS: [&str; 4] = [
    User::COLLECTION,
    Drug::COLLECTION,
    Prescription::COLLECTION,
    Transaction::COLLECTION,
];

/// A persistent store implementation using RocksDB.
///
/// Each collection lives in its own column family, keyed by the record's
/// position as a big-endian `u32` so iteration returns insertion order.
/// A save replaces the column family contents in one `WriteBatch`, which
/// RocksDB applies atomically.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that a column family exists for every collection.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLLECTIONS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn handle(&self, collection: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(collection).ok_or_else(|| {
            PharmacyError::PersistenceError(Box::new(std::io::Error::other(format!(
                "{collection} column family not found"
            ))))
        })
    }
}

#[async_trait]
impl<T: Record> RecordStore<T> for RocksDBStore {
    async fn load_all(&self) -> Result<Vec<T>> {
        let cf = self.handle(T::COLLECTION)?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }

        Ok(records)
    }

    async fn save_all(&self, records: &[T]) -> Result<()> {
        let cf = self.handle(T::COLLECTION)?;

        let mut batch = WriteBatch::default();
        batch.delete_range_cf(cf, &[0u8; 4][..], &[0xffu8; 5][..]);
        for (position, record) in records.iter().enumerate() {
            let key = u32::try_from(position)
                .map_err(|_| {
                    PharmacyError::PersistenceError(Box::new(std::io::Error::other(
                        "collection too large",
                    )))
                })?
                .to_be_bytes();
            batch.put_cf(cf, key, serde_json::to_vec(record)?);
        }
        self.db.write(batch)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in COLLECTIONS {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_collection_replace() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let drugs = vec![
            Drug::new("Aspirin", dec!(5.0), 10, "01/01/2030", 2),
            Drug::new("Ibuprofen", dec!(8.0), 4, "01/01/2030", 5),
            Drug::new("Cetirizine", dec!(3.5), 40, "01/01/2030", 5),
        ];
        RecordStore::<Drug>::save_all(&store, &drugs).await.unwrap();
        let loaded = RecordStore::<Drug>::load_all(&store).await.unwrap();
        assert_eq!(loaded, drugs);

        RecordStore::<Drug>::save_all(&store, &drugs[..1]).await.unwrap();
        let loaded = RecordStore::<Drug>::load_all(&store).await.unwrap();
        assert_eq!(loaded, drugs[..1].to_vec());
    }

    #[tokio::test]
    async fn test_rocksdb_collections_are_separate() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        RecordStore::<User>::save_all(&store, &[User::new("doc", "1234", Role::Doctor)])
            .await
            .unwrap();
        let drugs = RecordStore::<Drug>::load_all(&store).await.unwrap();
        assert!(drugs.is_empty());
        let users = RecordStore::<User>::load_all(&store).await.unwrap();
        assert_eq!(users.len(), 1);
    }
}
