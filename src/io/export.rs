use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{FinancialSummary, LedgerService, ServiceBreakdown};
use crate::domain::format_cents;

/// Point-in-time report bundle for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub summary: FinancialSummary,
    pub breakdown: ServiceBreakdown,
}

/// Exporter for writing reports to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the service breakdown as CSV, one row per record.
    pub async fn export_breakdown_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let breakdown = self.service.reports().compute_service_breakdown().await?;
        write_breakdown_csv(&breakdown, writer)
    }

    /// Export the summary and breakdown together as JSON.
    pub async fn export_report_json<W: Write>(&self, writer: W) -> Result<()> {
        let (summary, breakdown) = self.service.reports().compute_report().await?;
        let snapshot = ReportSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            summary,
            breakdown,
        };
        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(())
    }
}

/// Write breakdown rows as CSV. Amounts are plain decimals.
pub fn write_breakdown_csv<W: Write>(breakdown: &ServiceBreakdown, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "kind",
        "record_id",
        "service_category",
        "name",
        "phone",
        "total_payment",
        "current_receiving_payment",
        "remaining_amount",
        "payment_method",
        "account_number",
        "payer_name",
        "payment_date",
        "payment_count",
    ])?;

    let mut count = 0;
    for row in breakdown.rows() {
        csv_writer.write_record([
            row.kind.as_str().to_string(),
            row.record_id.to_string(),
            row.service_category.clone(),
            row.name.clone(),
            row.phone.clone().unwrap_or_default(),
            format_cents(row.total_payment),
            format_cents(row.current_receiving_payment),
            format_cents(row.remaining_amount),
            row.payment_method
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            row.account_number.clone().unwrap_or_default(),
            row.payer_name.clone().unwrap_or_default(),
            row.payment_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            row.payments.len().to_string(),
        ])?;
        count += 1;
    }

    csv_writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::application::BreakdownRow;
    use crate::domain::{PaymentMethod, RecordKind};

    fn row(kind: RecordKind, name: &str) -> BreakdownRow {
        BreakdownRow {
            record_id: Uuid::new_v4(),
            kind,
            service_category: "Visa".into(),
            name: name.into(),
            phone: Some("0300-1234567".into()),
            total_payment: 1000000,
            current_receiving_payment: 400000,
            remaining_amount: 600000,
            payment_method: Some(PaymentMethod::Bank),
            account_number: None,
            payer_name: Some("Usman, Sr.".into()),
            payment_date: Some(Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap()),
            payments: Vec::new(),
        }
    }

    #[test]
    fn test_breakdown_csv() {
        let mut breakdown = ServiceBreakdown::default();
        breakdown.push(row(RecordKind::Processing, "Zara"));
        breakdown.push(row(RecordKind::Converted, "Ali"));

        let mut out = Vec::new();
        let count = write_breakdown_csv(&breakdown, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(count, 2);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("kind,record_id,service_category"));
        // Converted rows come before processing rows
        assert!(lines[1].starts_with("converted,"));
        assert!(lines[1].contains(",10000.00,4000.00,6000.00,Bank,,\"Usman, Sr.\",2024-04-02,0"));
        assert!(lines[2].starts_with("processing,"));
    }
}
