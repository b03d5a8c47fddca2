use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    Cents, PaymentDraft, PaymentPatch, PaymentRecord, PaymentValidationError, PricingSnapshot,
    recompute_snapshot, relabel,
};

pub type RecordId = Uuid;

/// Which of the three record collections a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Client records converted from a lead
    Converted,
    /// Service records entered by hand
    Manual,
    /// In-progress services priced from the fixed catalog
    Processing,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Converted,
        RecordKind::Manual,
        RecordKind::Processing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Converted => "converted",
            RecordKind::Manual => "manual",
            RecordKind::Processing => "processing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "converted" => Some(RecordKind::Converted),
            "manual" => Some(RecordKind::Manual),
            "processing" => Some(RecordKind::Processing),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific metadata carried by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordDetails {
    Converted {
        #[serde(rename = "leadReference")]
        lead_reference: Option<String>,
    },
    Manual,
    Processing {
        #[serde(rename = "serviceTitle")]
        service_title: String,
    },
}

impl RecordDetails {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordDetails::Converted { .. } => RecordKind::Converted,
            RecordDetails::Manual => RecordKind::Manual,
            RecordDetails::Processing { .. } => RecordKind::Processing,
        }
    }

    /// Catalog title used to price the record when it has no snapshot.
    pub fn catalog_title(&self) -> Option<&str> {
        match self {
            RecordDetails::Processing { service_title } => Some(service_title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::InProgress => "in_progress",
            RecordStatus::Completed => "completed",
            RecordStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Some(RecordStatus::Pending),
            "in_progress" => Some(RecordStatus::InProgress),
            "completed" => Some(RecordStatus::Completed),
            "cancelled" | "canceled" => Some(RecordStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ClientIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: None,
            email: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A billable engagement with its payment history.
///
/// The three record kinds share this one shape; kind-specific data lives in
/// `details`. `pricing` is only absent for processing records created without
/// a negotiated total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: RecordId,
    pub service_category: String,
    pub client: ClientIdentity,
    pub status: RecordStatus,
    pub details: RecordDetails,
    pub payments: Vec<PaymentRecord>,
    pub pricing: Option<PricingSnapshot>,
    /// Bumped on every persisted change; used for optimistic concurrency
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The payment list and snapshot of a record, as returned by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    pub payments: Vec<PaymentRecord>,
    pub pricing: PricingSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    PaymentIndexOutOfRange { index: usize, len: usize },
    Validation(PaymentValidationError),
    NegativeTotal(Cents),
    MissingSnapshot,
    /// Received payments no longer fit in `Cents`
    AmountOverflow,
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::PaymentIndexOutOfRange { index, len } => {
                write!(f, "Payment index {} out of range ({} payments)", index, len)
            }
            LedgerError::Validation(err) => write!(f, "{}", err),
            LedgerError::NegativeTotal(total) => {
                write!(f, "Total payment cannot be negative (got {} cents)", total)
            }
            LedgerError::MissingSnapshot => write!(f, "Record has no pricing snapshot"),
            LedgerError::AmountOverflow => {
                write!(f, "Sum of payments exceeds the largest representable amount")
            }
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<PaymentValidationError> for LedgerError {
    fn from(err: PaymentValidationError) -> Self {
        LedgerError::Validation(err)
    }
}

impl ServiceRecord {
    /// Create a new record. Without a total the record starts with no snapshot.
    pub fn new(
        details: RecordDetails,
        service_category: impl Into<String>,
        client: ClientIdentity,
        total_payment: Option<Cents>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            service_category: service_category.into(),
            client,
            status: RecordStatus::Pending,
            details,
            payments: Vec::new(),
            pricing: total_payment.map(PricingSnapshot::zero),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.details.kind()
    }

    pub fn total_payment(&self) -> Option<Cents> {
        self.pricing.as_ref().map(|p| p.total_payment)
    }

    /// Create the snapshot from `total_payment` if the record has none yet.
    pub fn ensure_pricing(&mut self, total_payment: Cents) -> Result<(), LedgerError> {
        if self.pricing.is_none() {
            self.pricing = Some(snapshot_for(total_payment.max(0), &self.payments)?);
        }
        Ok(())
    }

    /// Snapshot and payments, substituting `fallback_total` when no snapshot exists.
    pub fn ledger_state(&self, fallback_total: Cents) -> Result<LedgerState, LedgerError> {
        let pricing = match &self.pricing {
            Some(pricing) => pricing.clone(),
            None => snapshot_for(fallback_total.max(0), &self.payments)?,
        };
        Ok(LedgerState {
            payments: self.payments.clone(),
            pricing,
        })
    }

    /// Append a payment labelled by its new position.
    /// The record is left untouched if the payment is rejected.
    pub fn add_payment(&mut self, draft: PaymentDraft) -> Result<(), LedgerError> {
        self.require_pricing()?;
        let payment = draft.into_record(self.payments.len())?;
        self.payments.push(payment);
        if let Err(err) = self.recompute() {
            self.payments.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Apply a partial update to the payment at `index`.
    /// The record is left untouched if the update is rejected.
    pub fn edit_payment(&mut self, index: usize, patch: PaymentPatch) -> Result<(), LedgerError> {
        self.require_pricing()?;
        let len = self.payments.len();
        let payment = self
            .payments
            .get_mut(index)
            .ok_or(LedgerError::PaymentIndexOutOfRange { index, len })?;
        let original = payment.clone();
        patch.apply(payment)?;
        if let Err(err) = self.recompute() {
            self.payments[index] = original;
            return Err(err);
        }
        Ok(())
    }

    /// Remove the payment at `index` and relabel the rest by position.
    pub fn delete_payment(&mut self, index: usize) -> Result<PaymentRecord, LedgerError> {
        self.require_pricing()?;
        if index >= self.payments.len() {
            return Err(LedgerError::PaymentIndexOutOfRange {
                index,
                len: self.payments.len(),
            });
        }
        let removed = self.payments.remove(index);
        relabel(&mut self.payments);
        self.recompute()?;
        Ok(removed)
    }

    /// Revise the billed amount (contract change) and recompute.
    pub fn set_total_payment(&mut self, total_payment: Cents) -> Result<(), LedgerError> {
        if total_payment < 0 {
            return Err(LedgerError::NegativeTotal(total_payment));
        }
        self.pricing = Some(snapshot_for(total_payment, &self.payments)?);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_status(&mut self, status: RecordStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Rebuild the snapshot from the payment list, keeping the billed total.
    pub fn recompute(&mut self) -> Result<(), LedgerError> {
        let total = self.require_pricing()?.total_payment;
        self.pricing = Some(snapshot_for(total, &self.payments)?);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require_pricing(&self) -> Result<&PricingSnapshot, LedgerError> {
        self.pricing.as_ref().ok_or(LedgerError::MissingSnapshot)
    }
}

fn snapshot_for(total_payment: Cents, payments: &[PaymentRecord]) -> Result<PricingSnapshot, LedgerError> {
    recompute_snapshot(total_payment, payments).ok_or(LedgerError::AmountOverflow)
}
