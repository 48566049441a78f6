//! Read-only reports over the current records.
//!
//! Each report takes the read lock once, so it sees a single consistent
//! snapshot and never a half-applied mutation.

use super::engine::{PharmacyEngine, Records};
use crate::domain::drug::Drug;
use crate::domain::transaction::Transaction;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, warn};

/// A diagnosis is flagged once it has been seen more than this many times.
pub const EPIDEMIC_THRESHOLD: usize = 5;

/// Number of transactions shown on the dashboard.
const RECENT_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutbreakAlert {
    pub diagnosis: String,
    pub cases: usize,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ExpiryReport {
    pub expired: Vec<Drug>,
    pub expiring_soon: Vec<Drug>,
    /// Drugs whose expiry date could not be read.
    pub unreadable: Vec<Drug>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub users: usize,
    pub drugs: usize,
    pub prescriptions: usize,
    pub pending_prescriptions: usize,
    pub transactions: usize,
    pub low_stock: usize,
    pub daily_revenue: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub revenue: Decimal,
    pub low_stock: usize,
    pub pending_prescriptions: usize,
    /// Newest first.
    pub recent_transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IntegrityReport {
    pub prescriptions_checked: usize,
    pub transactions_checked: usize,
    pub tampered_prescriptions: Vec<u32>,
    pub tampered_transactions: Vec<u32>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.tampered_prescriptions.is_empty() && self.tampered_transactions.is_empty()
    }
}

impl PharmacyEngine {
    /// Drugs at or below their minimum threshold.
    pub async fn check_low_stock(&self) -> Vec<Drug> {
        let records = self.records.read().await;
        let low: Vec<Drug> = records
            .drugs
            .iter()
            .filter(|d| d.is_low_stock())
            .cloned()
            .collect();
        for drug in &low {
            warn!(drug = %drug.name, quantity = drug.quantity, "low stock");
        }
        low
    }

    pub async fn check_expiry(&self) -> ExpiryReport {
        let today = self.clock.today();
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.expiry_warning_days)))
            .unwrap_or(NaiveDate::MAX);

        let records = self.records.read().await;
        let mut report = ExpiryReport::default();
        for drug in &records.drugs {
            match drug.expiry() {
                None => report.unreadable.push(drug.clone()),
                Some(expiry) if expiry < today => report.expired.push(drug.clone()),
                Some(expiry) if expiry <= horizon => report.expiring_soon.push(drug.clone()),
                Some(_) => {}
            }
        }
        report
    }

    /// Diagnoses, compared ignoring case, seen more than [`EPIDEMIC_THRESHOLD`]
    /// times across all prescriptions. Most cases first.
    pub async fn check_epidemic_trends(&self) -> Vec<OutbreakAlert> {
        let records = self.records.read().await;

        let mut counts: BTreeMap<String, OutbreakAlert> = BTreeMap::new();
        for prescription in &records.prescriptions {
            let diagnosis = prescription.diagnosis.trim();
            if diagnosis.is_empty() {
                continue;
            }
            counts
                .entry(diagnosis.to_lowercase())
                .or_insert_with(|| OutbreakAlert {
                    diagnosis: diagnosis.to_string(),
                    cases: 0,
                })
                .cases += 1;
        }

        let mut alerts: Vec<OutbreakAlert> = counts
            .into_values()
            .filter(|a| a.cases > EPIDEMIC_THRESHOLD)
            .collect();
        alerts.sort_by(|a, b| b.cases.cmp(&a.cases));
        for alert in &alerts {
            warn!(diagnosis = %alert.diagnosis, cases = alert.cases, "potential outbreak");
        }
        alerts
    }

    /// Paid bills dated today.
    pub async fn daily_revenue(&self) -> Decimal {
        let today = self.today();
        let records = self.records.read().await;
        revenue_on(&records, &today)
    }

    pub async fn generate_report(&self) -> SystemReport {
        let today = self.today();
        let records = self.records.read().await;
        SystemReport {
            users: records.users.len(),
            drugs: records.drugs.len(),
            prescriptions: records.prescriptions.len(),
            pending_prescriptions: records
                .prescriptions
                .iter()
                .filter(|p| p.is_pending())
                .count(),
            transactions: records.transactions.len(),
            low_stock: records.drugs.iter().filter(|d| d.is_low_stock()).count(),
            daily_revenue: revenue_on(&records, &today),
        }
    }

    pub async fn dashboard(&self) -> Dashboard {
        let today = self.today();
        let records = self.records.read().await;
        Dashboard {
            revenue: revenue_on(&records, &today),
            low_stock: records.drugs.iter().filter(|d| d.is_low_stock()).count(),
            pending_prescriptions: records
                .prescriptions
                .iter()
                .filter(|p| p.is_pending())
                .count(),
            recent_transactions: records
                .transactions
                .iter()
                .rev()
                .take(RECENT_TRANSACTIONS)
                .cloned()
                .collect(),
        }
    }

    /// Re-verifies every stored signature.
    pub async fn integrity_audit(&self) -> IntegrityReport {
        let records = self.records.read().await;
        let mut report = IntegrityReport {
            prescriptions_checked: records.prescriptions.len(),
            transactions_checked: records.transactions.len(),
            ..IntegrityReport::default()
        };

        for p in &records.prescriptions {
            if !self.signer.verify(&p.signing_payload(), &p.signature) {
                error!(target: "rxflow::security", prescription_id = p.id, "SECURITY ALERT: prescription signature invalid");
                report.tampered_prescriptions.push(p.id);
            }
        }
        for t in &records.transactions {
            if !self.signer.verify(&t.signing_payload(), &t.signature) {
                error!(target: "rxflow::security", transaction_id = t.id, "SECURITY ALERT: transaction signature invalid");
                report.tampered_transactions.push(t.id);
            }
        }
        report
    }
}

fn revenue_on(records: &Records, date: &str) -> Decimal {
    records
        .transactions
        .iter()
        .filter(|t| t.date == date && t.is_settled())
        .fold(Decimal::ZERO, |total, t| total.saturating_add(t.amount))
}

#[cfg(test)]
mod tests {
    use crate::application::engine::PharmacyEngine;
    use crate::domain::drug::Drug;
    use crate::domain::prescription::PrescriptionDraft;
    use crate::domain::transaction::PaymentMethod;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::in_memory::InMemoryStores;
    use crate::infrastructure::signing::SigningAuthority;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn engine(stores: &InMemoryStores) -> PharmacyEngine {
        PharmacyEngine::open(
            stores.boxed(),
            Arc::new(SigningAuthority::ephemeral()),
            Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap())),
        )
        .await
        .unwrap()
        .with_expiry_warning_days(30)
    }

    fn draft(drug: &str, quantity: u32, diagnosis: &str) -> PrescriptionDraft {
        PrescriptionDraft {
            doctor_name: "doc".to_string(),
            patient_name: "Patient".to_string(),
            drug_name: drug.to_string(),
            quantity,
            date: None,
            diagnosis: diagnosis.to_string(),
        }
    }

    #[tokio::test]
    async fn test_low_stock_and_expiry() {
        let stores = InMemoryStores::new();
        stores
            .drugs
            .edit(|drugs| drugs.push(Drug::new("Smudged", dec!(1.0), 50, "??", 5)))
            .await;
        let engine = engine(&stores).await;
        engine
            .add_drug(Drug::new("Expired", dec!(1.0), 50, "01/03/2025", 5))
            .await
            .unwrap();
        engine
            .add_drug(Drug::new("Soon", dec!(1.0), 5, "01/04/2025", 5))
            .await
            .unwrap();
        engine
            .add_drug(Drug::new("Fresh", dec!(1.0), 50, "01/01/2027", 5))
            .await
            .unwrap();
        let low = engine.check_low_stock().await;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Soon");

        let expiry = engine.check_expiry().await;
        assert_eq!(expiry.expired[0].name, "Expired");
        assert_eq!(expiry.expiring_soon[0].name, "Soon");
        assert_eq!(expiry.expired.len() + expiry.expiring_soon.len(), 2);
        assert_eq!(expiry.unreadable.len(), 1);
        assert_eq!(expiry.unreadable[0].name, "Smudged");
    }

    #[tokio::test]
    async fn test_epidemic_threshold_is_exclusive() {
        let stores = InMemoryStores::new();
        let engine = engine(&stores).await;
        engine
            .add_drug(Drug::new("Coartem", dec!(10.0), 500, "01/01/2027", 5))
            .await
            .unwrap();

        for i in 0..6 {
            let diagnosis = if i % 2 == 0 { "Malaria" } else { "malaria " };
            engine
                .create_prescription(draft("Coartem", 1, diagnosis))
                .await
                .unwrap();
        }
        for _ in 0..5 {
            engine
                .create_prescription(draft("Coartem", 1, "Flu"))
                .await
                .unwrap();
        }
        engine
            .create_prescription(draft("Coartem", 1, ""))
            .await
            .unwrap();

        let alerts = engine.check_epidemic_trends().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].diagnosis, "Malaria");
        assert_eq!(alerts[0].cases, 6);
    }

    #[tokio::test]
    async fn test_revenue_counts_only_settled_bills_of_today() {
        let stores = InMemoryStores::new();
        let engine = engine(&stores).await;
        engine
            .add_drug(Drug::new("Paracetamol", dec!(50.0), 100, "01/01/2027", 20))
            .await
            .unwrap();

        let first = engine
            .create_prescription(draft("Paracetamol", 2, "Fever"))
            .await
            .unwrap();
        let second = engine
            .create_prescription(draft("Paracetamol", 3, "Fever"))
            .await
            .unwrap();
        let paid = engine.dispense_prescription(first.id).await.unwrap();
        engine.dispense_prescription(second.id).await.unwrap();
        engine
            .process_payment(paid.transaction.id, PaymentMethod::Insurance)
            .await
            .unwrap();

        assert_eq!(engine.daily_revenue().await, dec!(100.0));

        let report = engine.generate_report().await;
        assert_eq!(report.users, 4);
        assert_eq!(report.prescriptions, 2);
        assert_eq!(report.pending_prescriptions, 0);
        assert_eq!(report.transactions, 2);
        assert_eq!(report.daily_revenue, dec!(100.0));

        let dashboard = engine.dashboard().await;
        assert_eq!(dashboard.recent_transactions.len(), 2);
        assert_eq!(dashboard.recent_transactions[0].prescription_id, second.id);
    }

    #[tokio::test]
    async fn test_revenue_saturates_instead_of_overflowing() {
        let stores = InMemoryStores::new();
        let engine = engine(&stores).await;
        engine
            .add_drug(Drug::new("Orphan", Decimal::MAX, 10, "01/01/2027", 1))
            .await
            .unwrap();

        for _ in 0..2 {
            let p = engine
                .create_prescription(draft("Orphan", 1, "Rare"))
                .await
                .unwrap();
            let receipt = engine.dispense_prescription(p.id).await.unwrap();
            assert_eq!(receipt.transaction.amount, Decimal::MAX);
            engine
                .process_payment(receipt.transaction.id, PaymentMethod::Cash)
                .await
                .unwrap();
        }

        assert_eq!(engine.daily_revenue().await, Decimal::MAX);
        assert_eq!(engine.generate_report().await.daily_revenue, Decimal::MAX);
        assert_eq!(engine.dashboard().await.revenue, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_integrity_audit_flags_tampered_bill() {
        let stores = InMemoryStores::new();
        let signer = Arc::new(SigningAuthority::ephemeral());
        let clock = Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()));
        let engine = PharmacyEngine::open(stores.boxed(), signer.clone(), clock.clone())
            .await
            .unwrap();
        engine
            .add_drug(Drug::new("Paracetamol", dec!(50.0), 100, "01/01/2027", 20))
            .await
            .unwrap();
        let p = engine
            .create_prescription(draft("Paracetamol", 2, "Fever"))
            .await
            .unwrap();
        engine.dispense_prescription(p.id).await.unwrap();
        assert!(engine.integrity_audit().await.is_clean());
        drop(engine);

        stores
            .transactions
            .edit(|txs| txs[0].amount = dec!(1.0))
            .await;
        let reopened = PharmacyEngine::open(stores.boxed(), signer, clock)
            .await
            .unwrap();
        let report = reopened.integrity_audit().await;
        assert_eq!(report.transactions_checked, 1);
        assert_eq!(report.tampered_transactions, vec![1]);
        assert!(report.tampered_prescriptions.is_empty());
    }
}
