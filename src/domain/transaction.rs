use super::canonical_payload;
use crate::error::PharmacyError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum PaymentMethod {
    #[default]
    Pending,
    Cash,
    Insurance,
    Mobile,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Cash => "Cash",
            Self::Insurance => "Insurance",
            Self::Mobile => "Mobile",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = PharmacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "cash" => Ok(Self::Cash),
            "insurance" => Ok(Self::Insurance),
            "mobile" => Ok(Self::Mobile),
            other => Err(PharmacyError::ValidationError(format!(
                "Unknown payment method '{other}'"
            ))),
        }
    }
}

/// The bill generated when a prescription is dispensed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: u32,
    pub prescription_id: u32,
    pub amount: Decimal,
    pub date: String,
    /// Not covered by the signature; settled after the bill is issued.
    pub payment_method: PaymentMethod,
    pub signature: String,
}

impl Transaction {
    /// Bytes covered by the transaction signature:
    /// id, prescription id, amount and date, in that order.
    pub fn signing_payload(&self) -> Vec<u8> {
        canonical_payload(&[
            &self.id.to_string(),
            &self.prescription_id.to_string(),
            &self.amount.normalize().to_string(),
            &self.date,
        ])
    }

    pub fn is_settled(&self) -> bool {
        self.payment_method != PaymentMethod::Pending
    }

    /// Records how the bill was paid. A bill is settled once.
    pub fn settle(&mut self, method: PaymentMethod) -> Result<(), PharmacyError> {
        if method == PaymentMethod::Pending {
            return Err(PharmacyError::ValidationError(
                "Payment method must be Cash, Insurance or Mobile".to_string(),
            ));
        }
        if self.is_settled() {
            return Err(PharmacyError::ValidationError(format!(
                "Transaction {} is already settled via {}",
                self.id, self.payment_method
            )));
        }
        self.payment_method = method;
        Ok(())
    }
}
