use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Cheque,
    Bank,
    Easypaisa,
    Jazzcash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::Bank => "Bank",
            PaymentMethod::Easypaisa => "Easypaisa",
            PaymentMethod::Jazzcash => "Jazzcash",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "cheque" | "check" => Some(PaymentMethod::Cheque),
            "bank" => Some(PaymentMethod::Bank),
            "easypaisa" => Some(PaymentMethod::Easypaisa),
            "jazzcash" => Some(PaymentMethod::Jazzcash),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordinal label for the payment at `position` (zero-based).
pub fn ordinal_label(position: usize) -> String {
    match position {
        0 => "First Payment".to_string(),
        1 => "Second Payment".to_string(),
        2 => "Third Payment".to_string(),
        n => format!("Payment {}", n + 1),
    }
}

/// Reassign every label from its current list position.
pub fn relabel(payments: &mut [PaymentRecord]) {
    for (position, payment) in payments.iter_mut().enumerate() {
        payment.label = ordinal_label(position);
    }
}

/// A single payment received against a service record.
/// Payments have no identity of their own; they are addressed by list position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    /// Amount in cents (always positive)
    pub amount: Cents,
    pub date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub account_number: Option<String>,
    pub payer_name: Option<String>,
    pub remarks: Option<String>,
    pub label: String,
}

/// Incoming payment payload, as received from a caller.
/// Required fields are optional here so that missing values surface as
/// validation failures instead of deserialization errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    pub amount: Cents,
    pub date: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
    pub account_number: Option<String>,
    pub payer_name: Option<String>,
    pub remarks: Option<String>,
}

impl PaymentDraft {
    pub fn new(amount: Cents, date: DateTime<Utc>, method: PaymentMethod) -> Self {
        Self {
            amount,
            date: Some(date),
            method: Some(method),
            ..Default::default()
        }
    }

    pub fn with_account_number(mut self, account_number: impl Into<String>) -> Self {
        self.account_number = Some(account_number.into());
        self
    }

    pub fn with_payer_name(mut self, payer_name: impl Into<String>) -> Self {
        self.payer_name = Some(payer_name.into());
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    /// Validate the payload and turn it into a payment at `position`.
    pub fn into_record(self, position: usize) -> Result<PaymentRecord, PaymentValidationError> {
        if self.amount <= 0 {
            return Err(PaymentValidationError::NonPositiveAmount(self.amount));
        }
        let date = self.date.ok_or(PaymentValidationError::MissingField("date"))?;
        let method = self
            .method
            .ok_or(PaymentValidationError::MissingField("method"))?;

        Ok(PaymentRecord {
            amount: self.amount,
            date,
            method,
            account_number: self.account_number,
            payer_name: self.payer_name,
            remarks: self.remarks,
            label: ordinal_label(position),
        })
    }
}

/// Partial update for an existing payment. `None` leaves a field untouched.
///
/// The optional text fields take `Some(None)` to clear the stored value. In
/// JSON an absent key leaves the field alone and `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPatch {
    pub amount: Option<Cents>,
    pub date: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub account_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub payer_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub remarks: Option<Option<String>>,
}

/// A key that is present, including an explicit `null`, is an update.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl PaymentPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.date.is_none()
            && self.method.is_none()
            && self.account_number.is_none()
            && self.payer_name.is_none()
            && self.remarks.is_none()
    }

    /// Apply the provided fields to `payment`. The label is never changed.
    pub fn apply(self, payment: &mut PaymentRecord) -> Result<(), PaymentValidationError> {
        if let Some(amount) = self.amount {
            if amount <= 0 {
                return Err(PaymentValidationError::NonPositiveAmount(amount));
            }
            payment.amount = amount;
        }
        if let Some(date) = self.date {
            payment.date = date;
        }
        if let Some(method) = self.method {
            payment.method = method;
        }
        if let Some(account_number) = self.account_number {
            payment.account_number = account_number;
        }
        if let Some(payer_name) = self.payer_name {
            payment.payer_name = payer_name;
        }
        if let Some(remarks) = self.remarks {
            payment.remarks = remarks;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentValidationError {
    NonPositiveAmount(Cents),
    MissingField(&'static str),
}

impl std::fmt::Display for PaymentValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentValidationError::NonPositiveAmount(amount) => {
                write!(f, "Payment amount must be positive (got {} cents)", amount)
            }
            PaymentValidationError::MissingField(field) => {
                write!(f, "Payment {} is required", field)
            }
        }
    }
}

impl std::error::Error for PaymentValidationError {}
