use crate::domain::drug::Drug;
use crate::domain::format_date;
use crate::domain::ports::{ClockRef, Record, RecordStoreBox, SignerRef, Stores};
use crate::domain::prescription::{Prescription, PrescriptionDraft, PrescriptionStatus};
use crate::domain::transaction::{PaymentMethod, Transaction};
use crate::domain::user::User;
use crate::error::{PharmacyError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{error, info, warn};

/// In-memory copy of the four collections plus the id counters.
pub(crate) struct Records {
    pub(crate) users: Vec<User>,
    pub(crate) drugs: Vec<Drug>,
    pub(crate) prescriptions: Vec<Prescription>,
    pub(crate) transactions: Vec<Transaction>,
    next_prescription_id: u32,
    next_transaction_id: u32,
}

impl Records {
    pub(crate) fn find_drug(&self, name: &str) -> Option<&Drug> {
        self.drugs.iter().find(|d| d.is_named(name))
    }
}

/// Everything produced by a successful dispense.
#[derive(Debug, Clone, Serialize)]
pub struct DispenseReceipt {
    pub prescription: Prescription,
    pub transaction: Transaction,
    pub remaining_stock: u32,
}

/// The prescription-to-billing workflow.
///
/// `PharmacyEngine` owns the in-memory records and the stores behind them.
/// Every mutating operation holds the write lock for its whole
/// check, sign, persist and commit sequence, so two operations never
/// interleave. Changes are staged on copies of the affected collections and
/// only become visible after every store accepted them.
pub struct PharmacyEngine {
    pub(crate) records: RwLock<Records>,
    stores: Stores,
    pub(crate) signer: SignerRef,
    pub(crate) clock: ClockRef,
    pub(crate) expiry_warning_days: u32,
}

impl PharmacyEngine {
    /// Loads every collection and prepares the engine.
    ///
    /// # Arguments
    ///
    /// * `stores` - Backing stores for users, drugs, prescriptions and transactions.
    /// * `signer` - Signs and verifies prescriptions and bills.
    /// * `clock` - Source of today's date for bills and reports.
    pub async fn open(stores: Stores, signer: SignerRef, clock: ClockRef) -> Result<Self> {
        let mut users = stores.users.load_all().await?;
        let drugs = stores.drugs.load_all().await?;
        let prescriptions = stores.prescriptions.load_all().await?;
        let transactions = stores.transactions.load_all().await?;

        if users.is_empty() {
            users = User::defaults();
            stores.users.save_all(&users).await?;
            info!(count = users.len(), "seeded default users");
        }

        if !signer.is_available() {
            warn!("signing is unavailable; prescriptions cannot be created or dispensed");
        }

        let next_prescription_id = next_id(prescriptions.iter().map(|p| p.id));
        let next_transaction_id = next_id(transactions.iter().map(|t| t.id));

        info!(
            users = users.len(),
            drugs = drugs.len(),
            prescriptions = prescriptions.len(),
            transactions = transactions.len(),
            "records loaded"
        );

        Ok(Self {
            records: RwLock::new(Records {
                users,
                drugs,
                prescriptions,
                transactions,
                next_prescription_id,
                next_transaction_id,
            }),
            stores,
            signer,
            clock,
            expiry_warning_days: 30,
        })
    }

    /// Sets how many days ahead `check_expiry` warns about.
    pub fn with_expiry_warning_days(mut self, days: u32) -> Self {
        self.expiry_warning_days = days;
        self
    }

    pub(crate) fn today(&self) -> String {
        format_date(self.clock.today())
    }

    // --- Users ---

    /// Returns the user whose credentials match exactly.
    pub async fn login(&self, username: &str, password: &str) -> Option<User> {
        let records = self.records.read().await;
        let user = records
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .cloned();
        match &user {
            Some(u) => info!(username, role = %u.role, "login succeeded"),
            None => warn!(username, "login failed"),
        }
        user
    }

    pub async fn add_user(&self, user: User) -> Result<()> {
        if user.username.trim().is_empty() || user.password.is_empty() {
            return Err(PharmacyError::ValidationError(
                "Username and password must not be empty".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        if records.users.iter().any(|u| u.username == user.username) {
            warn!(username = %user.username, "duplicate user rejected");
            return Err(PharmacyError::DuplicateUser(user.username));
        }

        let mut users = records.users.clone();
        users.push(user.clone());
        self.stores.users.save_all(&users).await?;
        records.users = users;

        info!(username = %user.username, role = %user.role, "user added");
        Ok(())
    }

    // --- Inventory ---

    /// Adds a drug unless one with the same name, ignoring case, exists.
    pub async fn add_drug(&self, drug: Drug) -> Result<()> {
        let drug = drug.normalized();
        drug.validate()?;

        let mut records = self.records.write().await;
        if records.find_drug(&drug.name).is_some() {
            warn!(drug = %drug.name, "duplicate drug rejected");
            return Err(PharmacyError::DuplicateDrug(drug.name));
        }

        let mut drugs = records.drugs.clone();
        drugs.push(drug.clone());
        self.stores.drugs.save_all(&drugs).await?;
        records.drugs = drugs;

        info!(drug = %drug.name, quantity = drug.quantity, "drug added");
        Ok(())
    }

    pub async fn find_drug(&self, name: &str) -> Option<Drug> {
        self.records.read().await.find_drug(name).cloned()
    }

    pub async fn list_drugs(&self) -> Vec<Drug> {
        self.records.read().await.drugs.clone()
    }

    // --- Prescriptions ---

    /// Signs and stores a new pending prescription.
    ///
    /// The engine assigns the id. When the signer cannot sign, nothing is
    /// stored and [`PharmacyError::IntegrityUnavailable`] is returned.
    pub async fn create_prescription(&self, draft: PrescriptionDraft) -> Result<Prescription> {
        let patient = draft.patient_name.clone();
        let result = self.try_create_prescription(draft).await;
        match &result {
            Ok(p) => info!(
                prescription_id = p.id,
                patient = %p.patient_name,
                drug = %p.drug_name,
                quantity = p.quantity,
                "prescription created"
            ),
            Err(e) => warn!(patient = %patient, error = %e, "prescription rejected"),
        }
        result
    }

    async fn try_create_prescription(&self, draft: PrescriptionDraft) -> Result<Prescription> {
        draft.validate()?;

        let mut records = self.records.write().await;
        let drug_name = records
            .find_drug(&draft.drug_name)
            .map(|d| d.name.clone())
            .ok_or_else(|| {
                PharmacyError::ValidationError(format!("Unknown drug '{}'", draft.drug_name))
            })?;

        let mut prescription = Prescription {
            id: records.next_prescription_id,
            doctor_name: draft.doctor_name.trim().to_string(),
            patient_name: draft.patient_name.trim().to_string(),
            drug_name,
            quantity: draft.quantity,
            date: match draft.date {
                Some(date) => date.trim().to_string(),
                None => self.today(),
            },
            status: PrescriptionStatus::Pending,
            diagnosis: draft.diagnosis.trim().to_string(),
            signature: String::new(),
        };
        prescription.signature = self.signer.sign(&prescription.signing_payload())?;

        let mut prescriptions = records.prescriptions.clone();
        prescriptions.push(prescription.clone());
        self.stores.prescriptions.save_all(&prescriptions).await?;
        records.prescriptions = prescriptions;
        records.next_prescription_id = prescription.id.saturating_add(1);

        Ok(prescription)
    }

    pub async fn pending_prescriptions(&self) -> Vec<Prescription> {
        let records = self.records.read().await;
        records
            .prescriptions
            .iter()
            .filter(|p| p.is_pending())
            .cloned()
            .collect()
    }

    pub async fn list_prescriptions(&self) -> Vec<Prescription> {
        self.records.read().await.prescriptions.clone()
    }

    /// Moves a pending prescription to dispensed.
    ///
    /// In order: the prescription must exist and be pending, its signature
    /// must verify, and the drug must have enough stock. On success the stock
    /// is reduced, the prescription is marked dispensed and exactly one
    /// signed bill is created, all persisted before becoming visible.
    pub async fn dispense_prescription(&self, id: u32) -> Result<DispenseReceipt> {
        let mut records = self.records.write().await;
        let result = self.try_dispense(&mut records, id).await;
        match &result {
            Ok(receipt) => info!(
                prescription_id = id,
                transaction_id = receipt.transaction.id,
                amount = %receipt.transaction.amount,
                remaining_stock = receipt.remaining_stock,
                "prescription dispensed"
            ),
            Err(e) if e.is_security_alert() => error!(
                target: "rxflow::security",
                prescription_id = id,
                "SECURITY ALERT: prescription signature verification failed; record may be tampered"
            ),
            Err(e) => warn!(prescription_id = id, error = %e, "dispense rejected"),
        }
        result
    }

    async fn try_dispense(
        &self,
        records: &mut RwLockWriteGuard<'_, Records>,
        id: u32,
    ) -> Result<DispenseReceipt> {
        let index = records
            .prescriptions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PharmacyError::NotFoundError(format!("Prescription {id}")))?;
        let prescription = &records.prescriptions[index];

        if !prescription.is_pending() {
            return Err(PharmacyError::InvalidState(format!(
                "prescription {id} is already {}",
                prescription.status
            )));
        }

        if !self
            .signer
            .verify(&prescription.signing_payload(), &prescription.signature)
        {
            return Err(PharmacyError::SecurityError {
                entity: "prescription",
                id,
            });
        }

        if records.transactions.iter().any(|t| t.prescription_id == id) {
            return Err(PharmacyError::InvalidState(format!(
                "prescription {id} has already been billed"
            )));
        }

        let drug_index = records
            .drugs
            .iter()
            .position(|d| d.is_named(&prescription.drug_name))
            .ok_or_else(|| PharmacyError::DrugUnavailable(prescription.drug_name.clone()))?;

        let mut drugs = records.drugs.clone();
        let drug = &mut drugs[drug_index];
        drug.withdraw(prescription.quantity)?;
        let remaining_stock = drug.quantity;
        let amount = Decimal::from(prescription.quantity)
            .checked_mul(drug.price)
            .ok_or_else(|| {
                PharmacyError::ValidationError(format!(
                    "bill for prescription {id} ({} x {}) exceeds the supported amount",
                    prescription.quantity, drug.price
                ))
            })?;

        let mut transaction = Transaction {
            id: records.next_transaction_id,
            prescription_id: id,
            amount,
            date: self.today(),
            payment_method: PaymentMethod::Pending,
            signature: String::new(),
        };
        transaction.signature = self.signer.sign(&transaction.signing_payload())?;

        let mut prescriptions = records.prescriptions.clone();
        prescriptions[index].status = PrescriptionStatus::Dispensed;
        let dispensed = prescriptions[index].clone();

        let mut transactions = records.transactions.clone();
        transactions.push(transaction.clone());

        self.persist_dispense(&**records, &drugs, &prescriptions, &transactions)
            .await?;

        records.drugs = drugs;
        records.prescriptions = prescriptions;
        records.transactions = transactions;
        records.next_transaction_id = transaction.id.saturating_add(1);

        Ok(DispenseReceipt {
            prescription: dispensed,
            transaction,
            remaining_stock,
        })
    }

    /// Saves the three collections a dispense touches. If a later save fails,
    /// the earlier ones are rewritten from the committed records so the
    /// stores go back to matching memory.
    async fn persist_dispense(
        &self,
        committed: &Records,
        drugs: &[Drug],
        prescriptions: &[Prescription],
        transactions: &[Transaction],
    ) -> Result<()> {
        self.stores.drugs.save_all(drugs).await?;

        if let Err(e) = self.stores.prescriptions.save_all(prescriptions).await {
            restore(&self.stores.drugs, &committed.drugs).await;
            return Err(e);
        }

        if let Err(e) = self.stores.transactions.save_all(transactions).await {
            restore(&self.stores.drugs, &committed.drugs).await;
            restore(&self.stores.prescriptions, &committed.prescriptions).await;
            return Err(e);
        }

        Ok(())
    }

    // --- Billing ---

    /// Records the payment method of a bill. The method is not part of the
    /// signed payload, so no verification is needed.
    ///
    /// A bill is settled once: paying an already settled bill is rejected
    /// instead of overwriting its method.
    pub async fn process_payment(
        &self,
        transaction_id: u32,
        method: PaymentMethod,
    ) -> Result<Transaction> {
        let mut records = self.records.write().await;
        let index = records
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or_else(|| PharmacyError::NotFoundError(format!("Transaction {transaction_id}")))?;

        let mut transactions = records.transactions.clone();
        if let Err(e) = transactions[index].settle(method) {
            warn!(transaction_id, error = %e, "payment rejected");
            return Err(e);
        }
        let settled = transactions[index].clone();
        self.stores.transactions.save_all(&transactions).await?;
        records.transactions = transactions;

        info!(transaction_id, method = %method, "payment processed");
        Ok(settled)
    }

    pub async fn list_transactions(&self) -> Vec<Transaction> {
        self.records.read().await.transactions.clone()
    }

    /// Checks a stored bill against its signature.
    pub async fn verify_transaction(&self, transaction_id: u32) -> Result<bool> {
        let records = self.records.read().await;
        let transaction = records
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| PharmacyError::NotFoundError(format!("Transaction {transaction_id}")))?;
        Ok(self
            .signer
            .verify(&transaction.signing_payload(), &transaction.signature))
    }
}

fn next_id(ids: impl Iterator<Item = u32>) -> u32 {
    ids.max().map_or(1, |id| id.saturating_add(1))
}

async fn restore<T: Record>(store: &RecordStoreBox<T>, records: &[T]) {
    if let Err(e) = store.save_all(records).await {
        error!(
            collection = T::COLLECTION,
            error = %e,
            "failed to restore collection after a partial save"
        );
    }
}
