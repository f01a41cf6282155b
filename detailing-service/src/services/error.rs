use service_core::error::AppError;
use thiserror::Error;

use super::store::StoreError;
use crate::models::{JobError, LedgerError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("{0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Concurrent update of {0}; retry the request")]
    VersionConflict(String),

    #[error("Invoice generation failed for business '{business}' after creating {created:?}: {reason}")]
    InvoiceGeneration {
        created: Vec<String>,
        business: String,
        reason: String,
    },
}

impl ServiceError {
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, ServiceError::VersionConflict(_))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(StoreError::Database(e)) => AppError::DatabaseError(e.into()),
            ServiceError::Store(StoreError::Duplicate(what)) => {
                AppError::Conflict(anyhow::anyhow!("Already exists: {}", what))
            }
            ServiceError::Ledger(e) => match e {
                LedgerError::InsufficientStock { .. } => AppError::Conflict(e.into()),
                LedgerError::RollNotFound(_) => AppError::NotFound(e.into()),
                LedgerError::InvalidQuantity(_) | LedgerError::Unsupported(_) => {
                    AppError::BadRequest(e.into())
                }
            },
            ServiceError::Job(e) => match e {
                JobError::TerminalStage(_) | JobError::Invoiced => AppError::Conflict(e.into()),
                _ => AppError::BadRequest(e.into()),
            },
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::VersionConflict(_) => AppError::Conflict(err.into()),
            ServiceError::InvoiceGeneration {
                created,
                business,
                reason,
            } => AppError::PartialFailure {
                message: format!("Invoice generation failed for business '{}'", business),
                details: format!("created: [{}]; cause: {}", created.join(", "), reason),
            },
        }
    }
}
