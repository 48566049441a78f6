use super::{has_control_chars, names_match, parse_date};
use crate::error::PharmacyError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A stocked drug. The name is the key and is compared case-insensitively.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Drug {
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Units on hand.
    pub quantity: u32,
    /// Expiry date as `DD/MM/YYYY`.
    pub expiry_date: String,
    /// Stock level at or below which the drug is reported as low.
    pub min_threshold: u32,
}

impl Drug {
    pub fn new(
        name: impl Into<String>,
        price: Decimal,
        quantity: u32,
        expiry_date: impl Into<String>,
        min_threshold: u32,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            quantity,
            expiry_date: expiry_date.into(),
            min_threshold,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_threshold
    }

    pub fn is_named(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }

    pub fn expiry(&self) -> Option<NaiveDate> {
        parse_date(&self.expiry_date)
    }

    /// Trims the name and expiry date, which are stored and signed as-is.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.expiry_date = self.expiry_date.trim().to_string();
        self
    }

    pub fn validate(&self) -> Result<(), PharmacyError> {
        if self.name.trim().is_empty() {
            return Err(PharmacyError::ValidationError(
                "Drug name must not be empty".to_string(),
            ));
        }
        if has_control_chars(&self.name) {
            return Err(PharmacyError::ValidationError(
                "Drug name must not contain control characters".to_string(),
            ));
        }
        if self.price < Decimal::ZERO {
            return Err(PharmacyError::ValidationError(
                "Drug price must not be negative".to_string(),
            ));
        }
        if self.expiry().is_none() {
            return Err(PharmacyError::ValidationError(format!(
                "Expiry date '{}' is not in DD/MM/YYYY format",
                self.expiry_date
            )));
        }
        Ok(())
    }

    /// Removes units from stock if enough are on hand.
    pub fn withdraw(&mut self, units: u32) -> Result<(), PharmacyError> {
        if self.quantity >= units {
            self.quantity -= units;
            Ok(())
        } else {
            Err(PharmacyError::InsufficientStock {
                drug: self.name.clone(),
                requested: units,
                available: self.quantity,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn paracetamol() -> Drug {
        Drug::new("Paracetamol", dec!(50.0), 100, "01/01/2026", 20)
    }

    #[test]
    fn test_low_stock_is_inclusive() {
        let mut drug = paracetamol();
        assert!(!drug.is_low_stock());
        drug.quantity = 20;
        assert!(drug.is_low_stock());
    }

    #[test]
    fn test_withdraw_success() {
        let mut drug = paracetamol();
        drug.withdraw(30).unwrap();
        assert_eq!(drug.quantity, 70);
    }

    #[test]
    fn test_withdraw_insufficient() {
        let mut drug = paracetamol();
        let result = drug.withdraw(101);
        assert!(matches!(
            result,
            Err(PharmacyError::InsufficientStock {
                requested: 101,
                available: 100,
                ..
            })
        ));
        assert_eq!(drug.quantity, 100);
    }

    #[test]
    fn test_validation() {
        assert!(paracetamol().validate().is_ok());

        let mut negative = paracetamol();
        negative.price = dec!(-1.0);
        assert!(matches!(
            negative.validate(),
            Err(PharmacyError::ValidationError(_))
        ));

        let mut bad_date = paracetamol();
        bad_date.expiry_date = "2026-01-01".to_string();
        assert!(bad_date.validate().is_err());

        let mut blank = paracetamol();
        blank.name = "  ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_normalized_trims_stored_fields() {
        let drug = Drug::new("  Aspirin \t", dec!(5.0), 10, " 01/01/2030 ", 2).normalized();
        assert_eq!(drug.name, "Aspirin");
        assert_eq!(drug.expiry_date, "01/01/2030");
        assert!(drug.validate().is_ok());
    }

    #[test]
    fn test_control_characters_rejected_in_name() {
        let drug = Drug::new("Asp\u{1f}irin", dec!(5.0), 10, "01/01/2030", 2);
        assert!(matches!(
            drug.validate(),
            Err(PharmacyError::ValidationError(_))
        ));
    }

    #[test]
    fn test_is_named_case_insensitive() {
        assert!(paracetamol().is_named("PARACETAMOL"));
    }
}
