// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use receivables::application::{LedgerService, NewRecord};
use receivables::domain::{
    Cents, ClientIdentity, PaymentDraft, PaymentMethod, RecordDetails, ServiceRecord,
};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Payment payload dated `date` with the given method
pub fn payment(amount: Cents, date: &str, method: PaymentMethod) -> PaymentDraft {
    PaymentDraft::new(amount, parse_date(date), method)
}

/// Test fixture: records of each kind
pub struct Records;

impl Records {
    pub async fn manual(
        service: &LedgerService,
        category: &str,
        total: Cents,
    ) -> Result<ServiceRecord> {
        Ok(service
            .create_record(
                NewRecord::new(
                    RecordDetails::Manual,
                    category,
                    ClientIdentity::new("Manual Client").with_phone("0300-0000001"),
                )
                .with_total(total),
            )
            .await?)
    }

    pub async fn converted(
        service: &LedgerService,
        category: &str,
        total: Cents,
    ) -> Result<ServiceRecord> {
        Ok(service
            .create_record(
                NewRecord::new(
                    RecordDetails::Converted {
                        lead_reference: Some("LEAD-42".into()),
                    },
                    category,
                    ClientIdentity::new("Converted Client"),
                )
                .with_total(total),
            )
            .await?)
    }

    /// Processing record with a negotiated total
    pub async fn processing(
        service: &LedgerService,
        title: &str,
        total: Cents,
    ) -> Result<ServiceRecord> {
        Ok(service
            .create_record(
                NewRecord::new(
                    RecordDetails::Processing {
                        service_title: title.into(),
                    },
                    title,
                    ClientIdentity::new("Processing Client"),
                )
                .with_total(total),
            )
            .await?)
    }

    /// Processing record priced from the catalog
    pub async fn processing_from_catalog(
        service: &LedgerService,
        title: &str,
    ) -> Result<ServiceRecord> {
        Ok(service
            .create_record(NewRecord::new(
                RecordDetails::Processing {
                    service_title: title.into(),
                },
                title,
                ClientIdentity::new("Catalog Client"),
            ))
            .await?)
    }
}
