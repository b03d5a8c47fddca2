use thiserror::Error;

use crate::domain::{LedgerError, RecordKind};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{kind} record not found: {id}")]
    RecordNotFound { kind: RecordKind, id: String },

    #[error("Payment {index} not found on record {record_id} ({len} payments)")]
    PaymentNotFound {
        record_id: String,
        index: usize,
        len: usize,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Record {0} was modified concurrently; reload and retry")]
    ConcurrentModification(String),

    #[error("Payroll entry not found or already paid: {0}")]
    PayrollEntryNotFound(String),

    #[error("Aggregation dependency '{dependency}' unavailable: {reason}")]
    AggregationDependency {
        dependency: &'static str,
        reason: String,
    },

    #[error("Amount overflow while computing {0}")]
    AmountOverflow(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// Map a domain ledger failure on `record_id` into an application error.
    pub fn from_ledger(record_id: impl ToString, err: LedgerError) -> Self {
        match err {
            LedgerError::PaymentIndexOutOfRange { index, len } => AppError::PaymentNotFound {
                record_id: record_id.to_string(),
                index,
                len,
            },
            LedgerError::Validation(e) => AppError::Validation(e.to_string()),
            LedgerError::NegativeTotal(total) => AppError::Validation(format!(
                "total payment cannot be negative (got {} cents)",
                total
            )),
            LedgerError::MissingSnapshot => AppError::Validation(format!(
                "record {} has no pricing snapshot",
                record_id.to_string()
            )),
            LedgerError::AmountOverflow => AppError::Validation(format!(
                "payments on record {} would exceed the largest representable amount",
                record_id.to_string()
            )),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::RecordNotFound { .. }
                | AppError::PaymentNotFound { .. }
                | AppError::PayrollEntryNotFound(_)
        )
    }
}
