use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type PayrollId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayrollStatus {
    Pending,
    Paid,
}

impl PayrollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Pending => "pending",
            PayrollStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PayrollStatus::Pending),
            "paid" => Some(PayrollStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayrollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A salary line from the payroll ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollEntry {
    pub id: PayrollId,
    pub employee_name: String,
    pub salary: Cents,
    /// Pay period label, e.g. "2024-01"
    pub period: String,
    pub status: PayrollStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PayrollEntry {
    pub fn new(employee_name: impl Into<String>, salary: Cents, period: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_name: employee_name.into(),
            salary,
            period: period.into(),
            status: PayrollStatus::Pending,
            paid_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_paid(mut self, paid_at: DateTime<Utc>) -> Self {
        self.status = PayrollStatus::Paid;
        self.paid_at = Some(paid_at);
        self
    }

    pub fn is_paid(&self) -> bool {
        self.status == PayrollStatus::Paid
    }
}
