use super::drug::Drug;
use super::prescription::Prescription;
use super::transaction::Transaction;
use super::user::User;
use crate::error::{IntegrityError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A record type kept in its own named collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
}

impl Record for User {
    const COLLECTION: &'static str = "users";
}

impl Record for Drug {
    const COLLECTION: &'static str = "drugs";
}

impl Record for Prescription {
    const COLLECTION: &'static str = "prescriptions";
}

impl Record for Transaction {
    const COLLECTION: &'static str = "transactions";
}

/// Durable backing for one collection.
///
/// `load_all` returns records in insertion order. `save_all` replaces the
/// whole collection; its errors must reach the caller.
#[async_trait]
pub trait RecordStore<T: Record>: Send + Sync {
    async fn load_all(&self) -> Result<Vec<T>>;
    async fn save_all(&self, records: &[T]) -> Result<()>;
}

pub type RecordStoreBox<T> = Box<dyn RecordStore<T>>;

/// The four collections the engine persists to.
pub struct Stores {
    pub users: RecordStoreBox<User>,
    pub drugs: RecordStoreBox<Drug>,
    pub prescriptions: RecordStoreBox<Prescription>,
    pub transactions: RecordStoreBox<Transaction>,
}

impl Stores {
    /// Uses one backend value for every collection.
    pub fn uniform<S>(store: S) -> Self
    where
        S: RecordStore<User>
            + RecordStore<Drug>
            + RecordStore<Prescription>
            + RecordStore<Transaction>
            + Clone
            + 'static,
    {
        Self {
            users: Box::new(store.clone()),
            drugs: Box::new(store.clone()),
            prescriptions: Box::new(store.clone()),
            transactions: Box::new(store),
        }
    }
}

/// Signing capability handed to the engine.
///
/// `sign` returns an explicit error instead of an empty signature when no
/// key is held; `verify` never fails, it answers `false` for anything that
/// does not check out.
pub trait PayloadSigner: Send + Sync {
    fn sign(&self, payload: &[u8]) -> std::result::Result<String, IntegrityError>;
    fn verify(&self, payload: &[u8], signature: &str) -> bool;
    fn is_available(&self) -> bool;
}

pub type SignerRef = Arc<dyn PayloadSigner>;

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub type ClockRef = Arc<dyn Clock>;
