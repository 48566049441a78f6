//! JSON request/response shapes for the network front end.
//!
//! Each request line carries the caller's credentials next to the
//! operation. Credentials are checked on every request and the operation's
//! permission is enforced before it reaches the engine.
//!
//! ```json
//! {"auth":{"username":"pharm","password":"1234"},"request":{"op":"dispense_prescription","id":1}}
//! ```

use crate::application::engine::PharmacyEngine;
use crate::application::session::Session;
use crate::domain::drug::Drug;
use crate::domain::prescription::PrescriptionDraft;
use crate::domain::transaction::PaymentMethod;
use crate::domain::user::{Permission, Role, User};
use crate::error::{ErrorKind, PharmacyError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    #[serde(default)]
    pub auth: Option<Credentials>,
    pub request: Request,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Login,
    ListDrugs,
    FindDrug {
        name: String,
    },
    AddDrug {
        drug: Drug,
    },
    AddUser {
        user: User,
    },
    CreatePrescription {
        patient_name: String,
        drug_name: String,
        quantity: u32,
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        diagnosis: String,
    },
    PendingPrescriptions,
    DispensePrescription {
        id: u32,
    },
    ProcessPayment {
        transaction_id: u32,
        method: String,
    },
    VerifyTransaction {
        transaction_id: u32,
    },
    ListTransactions,
    DailyRevenue,
    LowStock,
    Expiry,
    EpidemicTrends,
    Report,
    Dashboard,
    IntegrityAudit,
}

impl Request {
    /// Permission needed beyond valid credentials.
    pub fn required_permission(&self) -> Option<Permission> {
        match self {
            Request::Login => None,
            Request::ListDrugs | Request::FindDrug { .. } => Some(Permission::ViewInventory),
            Request::LowStock | Request::Expiry => Some(Permission::ViewInventory),
            Request::AddDrug { .. } => Some(Permission::ManageInventory),
            Request::AddUser { .. } => Some(Permission::ManageUsers),
            Request::CreatePrescription { .. } => Some(Permission::Prescribe),
            Request::PendingPrescriptions | Request::DispensePrescription { .. } => {
                Some(Permission::Dispense)
            }
            Request::ProcessPayment { .. } | Request::VerifyTransaction { .. } => {
                Some(Permission::ProcessPayments)
            }
            Request::ListTransactions | Request::DailyRevenue => Some(Permission::ViewRevenue),
            Request::EpidemicTrends | Request::Report | Request::Dashboard => {
                Some(Permission::ViewReports)
            }
            Request::IntegrityAudit => Some(Permission::AuditIntegrity),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { data: Value },
    Error { kind: ErrorKind, message: String },
}

impl From<PharmacyError> for Response {
    fn from(e: PharmacyError) -> Self {
        Response::Error {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Identity<'a> {
    username: &'a str,
    role: Role,
}

/// Parses and executes one request line.
pub async fn handle_line(engine: &PharmacyEngine, line: &str) -> Response {
    match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => handle(engine, envelope).await,
        Err(e) => Response::Error {
            kind: ErrorKind::Validation,
            message: format!("malformed request: {e}"),
        },
    }
}

pub async fn handle(engine: &PharmacyEngine, envelope: Envelope) -> Response {
    match dispatch(engine, envelope).await {
        Ok(data) => Response::Ok { data },
        Err(e) => e.into(),
    }
}

async fn dispatch(engine: &PharmacyEngine, envelope: Envelope) -> Result<Value> {
    let credentials = envelope
        .auth
        .ok_or_else(|| PharmacyError::AccessDenied("credentials required".to_string()))?;
    let mut session = Session::new();
    if !session
        .login(engine, &credentials.username, &credentials.password)
        .await
    {
        return Err(PharmacyError::AccessDenied("invalid credentials".to_string()));
    }
    let user = match envelope.request.required_permission() {
        Some(permission) => session.authorize(permission)?,
        None => session
            .current_user()
            .ok_or_else(|| PharmacyError::AccessDenied("not logged in".to_string()))?,
    };

    let data = match envelope.request {
        Request::Login => serde_json::to_value(Identity {
            username: &user.username,
            role: user.role,
        })?,
        Request::ListDrugs => serde_json::to_value(engine.list_drugs().await)?,
        Request::FindDrug { name } => {
            let drug = engine
                .find_drug(&name)
                .await
                .ok_or_else(|| PharmacyError::NotFoundError(format!("drug '{name}'")))?;
            serde_json::to_value(drug)?
        }
        Request::AddDrug { drug } => {
            engine.add_drug(drug).await?;
            Value::Null
        }
        Request::AddUser { user } => {
            engine.add_user(user).await?;
            Value::Null
        }
        Request::CreatePrescription {
            patient_name,
            drug_name,
            quantity,
            date,
            diagnosis,
        } => {
            let draft = PrescriptionDraft {
                doctor_name: user.username.clone(),
                patient_name,
                drug_name,
                quantity,
                date,
                diagnosis,
            };
            serde_json::to_value(engine.create_prescription(draft).await?)?
        }
        Request::PendingPrescriptions => {
            serde_json::to_value(engine.pending_prescriptions().await)?
        }
        Request::DispensePrescription { id } => {
            serde_json::to_value(engine.dispense_prescription(id).await?)?
        }
        Request::ProcessPayment {
            transaction_id,
            method,
        } => {
            let method: PaymentMethod = method.parse()?;
            serde_json::to_value(engine.process_payment(transaction_id, method).await?)?
        }
        Request::VerifyTransaction { transaction_id } => {
            serde_json::to_value(engine.verify_transaction(transaction_id).await?)?
        }
        Request::ListTransactions => serde_json::to_value(engine.list_transactions().await)?,
        Request::DailyRevenue => serde_json::to_value(engine.daily_revenue().await)?,
        Request::LowStock => serde_json::to_value(engine.check_low_stock().await)?,
        Request::Expiry => serde_json::to_value(engine.check_expiry().await)?,
        Request::EpidemicTrends => serde_json::to_value(engine.check_epidemic_trends().await)?,
        Request::Report => serde_json::to_value(engine.generate_report().await)?,
        Request::Dashboard => serde_json::to_value(engine.dashboard().await)?,
        Request::IntegrityAudit => serde_json::to_value(engine.integrity_audit().await)?,
    };
    Ok(data)
}
