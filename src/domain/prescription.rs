use super::{canonical_payload, has_control_chars, parse_date};
use crate::error::PharmacyError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    #[default]
    Pending,
    Dispensed,
}

impl std::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Dispensed => f.write_str("dispensed"),
        }
    }
}

/// A signed order to dispense a quantity of one drug to one patient.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Prescription {
    pub id: u32,
    pub doctor_name: String,
    pub patient_name: String,
    pub drug_name: String,
    pub quantity: u32,
    pub date: String,
    pub status: PrescriptionStatus,
    pub diagnosis: String,
    pub signature: String,
}

impl Prescription {
    /// Bytes covered by the prescription signature:
    /// patient, drug, quantity and date, in that order.
    pub fn signing_payload(&self) -> Vec<u8> {
        canonical_payload(&[
            &self.patient_name,
            &self.drug_name,
            &self.quantity.to_string(),
            &self.date,
        ])
    }

    pub fn is_pending(&self) -> bool {
        self.status == PrescriptionStatus::Pending
    }
}

/// What a doctor submits. The engine assigns the id, the status and the
/// signature; a missing date means today.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct PrescriptionDraft {
    pub doctor_name: String,
    pub patient_name: String,
    pub drug_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub diagnosis: String,
}

impl PrescriptionDraft {
    pub fn validate(&self) -> Result<(), PharmacyError> {
        if self.patient_name.trim().is_empty() {
            return Err(PharmacyError::ValidationError(
                "Patient name must not be empty".to_string(),
            ));
        }
        if self.drug_name.trim().is_empty() {
            return Err(PharmacyError::ValidationError(
                "Drug name must not be empty".to_string(),
            ));
        }
        for (field, value) in [
            ("Doctor name", self.doctor_name.as_str()),
            ("Patient name", self.patient_name.as_str()),
            ("Drug name", self.drug_name.as_str()),
            ("Prescription date", self.date.as_deref().unwrap_or_default()),
        ] {
            if has_control_chars(value) {
                return Err(PharmacyError::ValidationError(format!(
                    "{field} must not contain control characters"
                )));
            }
        }
        if self.quantity == 0 {
            return Err(PharmacyError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }
        if let Some(date) = &self.date
            && parse_date(date).is_none()
        {
            return Err(PharmacyError::ValidationError(format!(
                "Prescription date '{date}' is not in DD/MM/YYYY format"
            )));
        }
        Ok(())
    }
}
