use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Cents, PaymentMethod, PaymentRecord, PayrollEntry, RecordId, RecordKind};

/// System-wide financial position across every service record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_revenue: Cents,
    pub total_received: Cents,
    pub total_pending: Cents,
    pub salary_paid: Cents,
    /// Received cash minus paid salaries; can be negative
    pub total_profit: Cents,
    /// Billed totals keyed by the raw service category text
    pub revenue_by_service: BTreeMap<String, Cents>,
    pub latest_payrolls: Vec<PayrollEntry>,
    pub record_count: usize,
}

/// One record projected onto the shared breakdown shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownRow {
    pub record_id: RecordId,
    pub kind: RecordKind,
    pub service_category: String,
    pub name: String,
    pub phone: Option<String>,
    pub total_payment: Cents,
    pub current_receiving_payment: Cents,
    pub remaining_amount: Cents,
    pub payment_method: Option<PaymentMethod>,
    pub account_number: Option<String>,
    pub payer_name: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub payments: Vec<PaymentRecord>,
}

/// Breakdown rows grouped by the collection each record came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBreakdown {
    pub converted: Vec<BreakdownRow>,
    pub manual: Vec<BreakdownRow>,
    pub processing: Vec<BreakdownRow>,
}

impl ServiceBreakdown {
    pub fn bucket(&self, kind: RecordKind) -> &[BreakdownRow] {
        match kind {
            RecordKind::Converted => &self.converted,
            RecordKind::Manual => &self.manual,
            RecordKind::Processing => &self.processing,
        }
    }

    fn bucket_mut(&mut self, kind: RecordKind) -> &mut Vec<BreakdownRow> {
        match kind {
            RecordKind::Converted => &mut self.converted,
            RecordKind::Manual => &mut self.manual,
            RecordKind::Processing => &mut self.processing,
        }
    }

    pub fn push(&mut self, row: BreakdownRow) {
        self.bucket_mut(row.kind).push(row);
    }

    /// All rows in converted, manual, processing order.
    pub fn rows(&self) -> impl Iterator<Item = &BreakdownRow> {
        self.converted
            .iter()
            .chain(self.manual.iter())
            .chain(self.processing.iter())
    }

    pub fn len(&self) -> usize {
        self.converted.len() + self.manual.len() + self.processing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
