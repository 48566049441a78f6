use crate::domain::ports::{Record, RecordStore, Stores};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory collection.
///
/// Uses `Arc<RwLock<Vec<T>>>`, so clones share the same records. Ideal for
/// testing or for running without anything on disk.
#[derive(Clone)]
pub struct InMemoryStore<T> {
    records: Arc<RwLock<Vec<T>>>,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T: Record> InMemoryStore<T> {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `records`.
    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Applies `edit` to the stored records directly, bypassing any engine.
    pub async fn edit<F>(&self, edit: F)
    where
        F: FnOnce(&mut Vec<T>),
    {
        let mut records = self.records.write().await;
        edit(&mut records);
    }
}

#[async_trait]
impl<T: Record> RecordStore<T> for InMemoryStore<T> {
    async fn load_all(&self) -> Result<Vec<T>> {
        let records = self.records.read().await;
        Ok(records.clone())
    }

    async fn save_all(&self, records: &[T]) -> Result<()> {
        let mut stored = self.records.write().await;
        *stored = records.to_vec();
        Ok(())
    }
}

/// Handles onto a full set of in-memory collections.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub users: InMemoryStore<crate::domain::user::User>,
    pub drugs: InMemoryStore<crate::domain::drug::Drug>,
    pub prescriptions: InMemoryStore<crate::domain::prescription::Prescription>,
    pub transactions: InMemoryStore<crate::domain::transaction::Transaction>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxes shared clones of every collection for the engine.
    pub fn boxed(&self) -> Stores {
        Stores {
            users: Box::new(self.users.clone()),
            drugs: Box::new(self.drugs.clone()),
            prescriptions: Box::new(self.prescriptions.clone()),
            transactions: Box::new(self.transactions.clone()),
        }
    }
}
