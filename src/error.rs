use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Failures of the signing capability itself, independent of any workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("signing key material is unavailable: {0}")]
    Unavailable(String),
    #[error("invalid signing key material: {0}")]
    KeyMaterial(String),
}

#[derive(Error, Debug, Diagnostic)]
pub enum PharmacyError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(rxflow::validation))]
    ValidationError(String),

    #[error("A drug named '{0}' already exists")]
    #[diagnostic(
        code(rxflow::duplicate_drug),
        help("drug names are compared case-insensitively")
    )]
    DuplicateDrug(String),

    #[error("A user named '{0}' already exists")]
    #[diagnostic(code(rxflow::duplicate_user))]
    DuplicateUser(String),

    #[error(
        "SECURITY ALERT: signature verification failed for {entity} {id}; the record may have been tampered with"
    )]
    #[diagnostic(
        code(rxflow::security),
        severity(Error),
        help("do not dispense; investigate the stored record before taking any action")
    )]
    SecurityError { entity: &'static str, id: u32 },

    #[error("Insufficient stock of {drug}: requested {requested}, available {available}")]
    #[diagnostic(code(rxflow::stock))]
    InsufficientStock {
        drug: String,
        requested: u32,
        available: u32,
    },

    #[error("Drug '{0}' is not stocked")]
    #[diagnostic(code(rxflow::stock))]
    DrugUnavailable(String),

    #[error("{0} not found")]
    #[diagnostic(code(rxflow::not_found))]
    NotFoundError(String),

    #[error("Invalid state transition: {0}")]
    #[diagnostic(code(rxflow::invalid_state))]
    InvalidState(String),

    #[error("Persistence error: {0}")]
    #[diagnostic(code(rxflow::persistence))]
    PersistenceError(Box<dyn std::error::Error + Send + Sync>),

    #[error("Signing is unavailable: {0}")]
    #[diagnostic(
        code(rxflow::integrity_unavailable),
        help("check that the signing key file is readable and restart")
    )]
    IntegrityUnavailable(#[from] IntegrityError),

    #[error("Access denied: {0}")]
    #[diagnostic(code(rxflow::access_denied))]
    AccessDenied(String),
}

/// Coarse classification used at the presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Security,
    Stock,
    NotFound,
    Persistence,
    IntegrityUnavailable,
    Unauthorized,
}

impl PharmacyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::DuplicateDrug(_) | Self::DuplicateUser(_) => {
                ErrorKind::Validation
            }
            Self::SecurityError { .. } => ErrorKind::Security,
            Self::InsufficientStock { .. } | Self::DrugUnavailable(_) => ErrorKind::Stock,
            Self::NotFoundError(_) | Self::InvalidState(_) => ErrorKind::NotFound,
            Self::PersistenceError(_) => ErrorKind::Persistence,
            Self::IntegrityUnavailable(_) => ErrorKind::IntegrityUnavailable,
            Self::AccessDenied(_) => ErrorKind::Unauthorized,
        }
    }

    pub fn is_security_alert(&self) -> bool {
        self.kind() == ErrorKind::Security
    }
}

impl From<csv::Error> for PharmacyError {
    fn from(e: csv::Error) -> Self {
        Self::PersistenceError(Box::new(e))
    }
}

impl From<std::io::Error> for PharmacyError {
    fn from(e: std::io::Error) -> Self {
        Self::PersistenceError(Box::new(e))
    }
}

impl From<serde_json::Error> for PharmacyError {
    fn from(e: serde_json::Error) -> Self {
        Self::PersistenceError(Box::new(e))
    }
}

impl From<tempfile::PersistError> for PharmacyError {
    fn from(e: tempfile::PersistError) -> Self {
        Self::PersistenceError(Box::new(e.error))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PharmacyError {
    fn from(e: rocksdb::Error) -> Self {
        Self::PersistenceError(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, PharmacyError>;
