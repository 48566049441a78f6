use crate::domain::drug::Drug;
use crate::domain::ports::{Record, RecordStore, Stores};
use crate::domain::prescription::Prescription;
use crate::domain::transaction::Transaction;
use crate::domain::user::User;
use crate::error::{PharmacyError, Result};
use async_trait::async_trait;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Keeps one collection in `<dir>/<collection>.csv`.
///
/// Saves never modify the target in place: the collection is written to a
/// temporary file in the same directory, synced, then renamed over the
/// target, so readers see either the previous or the new collection.
pub struct CsvFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> CsvFileStore<T> {
    /// Opens the collection file under `dir`, creating `dir` if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(format!("{}.csv", T::COLLECTION)),
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<T>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(file);

        reader
            .deserialize()
            .map(|record| record.map_err(PharmacyError::from))
            .collect()
    }

    fn write(&self, records: &[T]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        debug!(
            collection = T::COLLECTION,
            records = records.len(),
            "collection saved"
        );
        Ok(())
    }
}

#[async_trait]
impl<T: Record> RecordStore<T> for CsvFileStore<T> {
    async fn load_all(&self) -> Result<Vec<T>> {
        self.read()
    }

    async fn save_all(&self, records: &[T]) -> Result<()> {
        self.write(records)
    }
}

/// One CSV file per collection, all under `dir`.
pub fn open_stores<P: AsRef<Path>>(dir: P) -> Result<Stores> {
    let dir = dir.as_ref();
    Ok(Stores {
        users: Box::new(CsvFileStore::<User>::open(dir)?),
        drugs: Box::new(CsvFileStore::<Drug>::open(dir)?),
        prescriptions: Box::new(CsvFileStore::<Prescription>::open(dir)?),
        transactions: Box::new(CsvFileStore::<Transaction>::open(dir)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prescription::PrescriptionStatus;
    use crate::domain::user::Role;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<User> = CsvFileStore::open(dir.path()).unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_preserves_order_and_fields() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<Drug> = CsvFileStore::open(dir.path()).unwrap();
        let drugs = vec![
            Drug::new("Paracetamol", dec!(50.0), 100, "01/01/2026", 20),
            Drug::new("Amoxicillin, 500mg", dec!(12.25), 3, "15/06/2027", 5),
        ];
        store.save_all(&drugs).await.unwrap();

        assert_eq!(store.load_all().await.unwrap(), drugs);
        assert!(store.path().ends_with("drugs.csv"));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temporary_files() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<User> = CsvFileStore::open(dir.path()).unwrap();
        store.save_all(&User::defaults()).await.unwrap();
        store.save_all(&User::defaults()[..1]).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prescription_file_layout() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<Prescription> = CsvFileStore::open(dir.path()).unwrap();
        let prescription = Prescription {
            id: 3,
            doctor_name: "doc".to_string(),
            patient_name: "Jane".to_string(),
            drug_name: "Paracetamol".to_string(),
            quantity: 30,
            date: "01/01/2025".to_string(),
            status: PrescriptionStatus::Pending,
            diagnosis: "Malaria".to_string(),
            signature: "c2ln".to_string(),
        };
        store.save_all(&[prescription.clone()]).await.unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with(
            "id,doctor_name,patient_name,drug_name,quantity,date,status,diagnosis,signature"
        ));
        assert!(content.contains("3,doc,Jane,Paracetamol,30,01/01/2025,pending,Malaria,c2ln"));
        assert_eq!(store.load_all().await.unwrap(), vec![prescription]);
    }

    #[tokio::test]
    async fn test_field_whitespace_survives_reload() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<Prescription> = CsvFileStore::open(dir.path()).unwrap();
        let prescription = Prescription {
            id: 1,
            doctor_name: "doc".to_string(),
            patient_name: " Jane".to_string(),
            drug_name: "Aspirin ".to_string(),
            quantity: 2,
            date: "01/01/2025".to_string(),
            status: PrescriptionStatus::Pending,
            diagnosis: "  Flu  ".to_string(),
            signature: "c2ln".to_string(),
        };
        store.save_all(&[prescription.clone()]).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![prescription.clone()]);
        assert_eq!(loaded[0].signing_payload(), prescription.signing_payload());
    }

    #[tokio::test]
    async fn test_padded_headers_still_match() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<User> = CsvFileStore::open(dir.path()).unwrap();
        std::fs::write(store.path(), " username , password , role\nbob,pw,Billing\n").unwrap();

        let users = store.load_all().await.unwrap();
        assert_eq!(users, vec![User::new("bob", "pw", Role::Billing)]);
    }

    #[tokio::test]
    async fn test_malformed_file_surfaces_error() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<User> = CsvFileStore::open(dir.path()).unwrap();
        std::fs::write(store.path(), "username,password,role\nbob,pw,Janitor\n").unwrap();

        let result = store.load_all().await;
        assert!(matches!(result, Err(PharmacyError::PersistenceError(_))));
    }

    #[tokio::test]
    async fn test_roles_persist_by_name() {
        let dir = tempdir().unwrap();
        let store: CsvFileStore<User> = CsvFileStore::open(dir.path()).unwrap();
        store
            .save_all(&[User::new("bill", "1234", Role::Billing)])
            .await
            .unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("bill,1234,Billing"));
    }
}
