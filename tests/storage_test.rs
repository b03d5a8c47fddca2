use anyhow::Result;
use chrono::{TimeZone, Utc};
use receivables::Repository;
use receivables::domain::{
    ClientIdentity, PaymentDraft, PaymentMethod, PayrollEntry, PayrollStatus, RecordDetails,
    RecordKind, RecordStatus, ServiceRecord,
};
use tempfile::TempDir;

async fn test_repo() -> Result<(Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;
    Ok((repo, temp_dir))
}

#[tokio::test]
async fn test_record_round_trip() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    let mut record = ServiceRecord::new(
        RecordDetails::Converted {
            lead_reference: Some("LEAD-7".into()),
        },
        "Visa",
        ClientIdentity::new("Ayesha")
            .with_phone("0300-1234567")
            .with_email("ayesha@example.com"),
        Some(5000),
    )
    .with_status(RecordStatus::InProgress);
    record.add_payment(
        PaymentDraft::new(
            1200,
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            PaymentMethod::Jazzcash,
        )
        .with_account_number("0301-7654321")
        .with_remarks("advance"),
    )?;
    repo.insert_record(&record).await?;

    let loaded = repo
        .load_record(RecordKind::Converted, record.id)
        .await?
        .expect("record should exist");

    assert_eq!(loaded.details, record.details);
    assert_eq!(loaded.client, record.client);
    assert_eq!(loaded.status, RecordStatus::InProgress);
    assert_eq!(loaded.payments, record.payments);
    assert_eq!(loaded.pricing, record.pricing);
    assert_eq!(loaded.version, 0);

    // Same id under another kind is not found
    assert!(repo.load_record(RecordKind::Manual, record.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_processing_record_without_snapshot() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    let record = ServiceRecord::new(
        RecordDetails::Processing {
            service_title: "Passport Renewal".into(),
        },
        "Passport Renewal",
        ClientIdentity::new("Bilal"),
        None,
    );
    repo.insert_record(&record).await?;

    let loaded = repo
        .load_record(RecordKind::Processing, record.id)
        .await?
        .expect("record should exist");
    assert!(loaded.pricing.is_none());
    assert!(loaded.payments.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_stale_version_is_rejected() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    let record = ServiceRecord::new(
        RecordDetails::Manual,
        "Visa",
        ClientIdentity::new("Hamza"),
        Some(1000),
    );
    repo.insert_record(&record).await?;

    let mut first = record.clone();
    first.set_total_payment(2000)?;
    first.version = 1;
    assert!(repo.replace_record(&first, 0).await?);

    // A writer still holding version 0 loses
    let mut second = record.clone();
    second.set_total_payment(3000)?;
    second.version = 1;
    assert!(!repo.replace_record(&second, 0).await?);

    let loaded = repo
        .load_record(RecordKind::Manual, record.id)
        .await?
        .expect("record should exist");
    assert_eq!(loaded.total_payment(), Some(2000));
    assert_eq!(loaded.version, 1);

    Ok(())
}

#[tokio::test]
async fn test_list_records_by_kind() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    for details in [
        RecordDetails::Manual,
        RecordDetails::Manual,
        RecordDetails::Converted {
            lead_reference: None,
        },
    ] {
        let record = ServiceRecord::new(details, "Visa", ClientIdentity::new("Client"), Some(100));
        repo.insert_record(&record).await?;
    }

    assert_eq!(repo.list_records(None).await?.len(), 3);
    assert_eq!(repo.list_records(Some(RecordKind::Manual)).await?.len(), 2);
    assert_eq!(repo.list_records(Some(RecordKind::Converted)).await?.len(), 1);
    assert!(repo.list_records(Some(RecordKind::Processing)).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_catalog_upsert() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    repo.set_catalog_price("Visit Visa", 1000).await?;
    repo.set_catalog_price("Visit Visa", 1500).await?;
    repo.set_catalog_price("Work Permit", 9000).await?;

    assert_eq!(repo.get_catalog_price("Visit Visa").await?, Some(1500));
    assert_eq!(repo.get_catalog_price("Unknown").await?, None);
    assert_eq!(repo.list_catalog().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_payroll_mark_paid() -> Result<()> {
    let (repo, _temp) = test_repo().await?;

    let entry = PayrollEntry::new("Sana", 45000, "2024-03");
    repo.save_payroll_entry(&entry).await?;
    assert!(repo.list_payroll(Some(PayrollStatus::Paid)).await?.is_empty());

    let paid_at = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
    assert!(repo.mark_payroll_paid(entry.id, paid_at).await?);
    // Already paid
    assert!(!repo.mark_payroll_paid(entry.id, paid_at).await?);

    let paid = repo.list_payroll(Some(PayrollStatus::Paid)).await?;
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].paid_at, Some(paid_at));
    assert_eq!(paid[0].salary, 45000);
    assert!(repo.list_payroll(Some(PayrollStatus::Pending)).await?.is_empty());

    Ok(())
}
