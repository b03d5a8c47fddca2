use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Cents, ClientIdentity, PaymentMethod, PaymentRecord, PayrollEntry, PayrollId, PayrollStatus,
    PricingSnapshot, RecordDetails, RecordId, RecordKind, RecordStatus, ServiceRecord,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_COLLABORATORS};

const RECORD_COLUMNS: &str = "id, kind, service_category, client_name, client_phone, client_email, status, details, payments, total_payment, current_receiving_payment, remaining_amount, last_payment_method, last_payment_account, last_payer_name, last_payment_date, version, created_at, updated_at";

const PAYROLL_COLUMNS: &str = "id, employee_name, salary_cents, period, status, paid_at, created_at";

/// Repository for persisting service records, the price catalog and payroll.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    /// WAL mode lets report reads proceed while a record is being written.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::raw_sql(MIGRATION_002_COLLABORATORS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Service record operations
    // ========================

    /// Insert a new service record.
    pub async fn insert_record(&self, record: &ServiceRecord) -> Result<()> {
        let payments_json = serde_json::to_string(&record.payments)?;
        let details_json = serde_json::to_string(&record.details)?;
        let pricing = record.pricing.as_ref();

        sqlx::query(&format!(
            "INSERT INTO service_records ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RECORD_COLUMNS
        ))
        .bind(record.id.to_string())
        .bind(record.kind().as_str())
        .bind(&record.service_category)
        .bind(&record.client.name)
        .bind(&record.client.phone)
        .bind(&record.client.email)
        .bind(record.status.as_str())
        .bind(&details_json)
        .bind(&payments_json)
        .bind(pricing.map(|p| p.total_payment))
        .bind(pricing.map(|p| p.current_receiving_payment))
        .bind(pricing.map(|p| p.remaining_amount))
        .bind(pricing.and_then(|p| p.last_payment_method).map(|m| m.as_str()))
        .bind(pricing.and_then(|p| p.last_payment_account.clone()))
        .bind(pricing.and_then(|p| p.last_payer_name.clone()))
        .bind(pricing.and_then(|p| p.last_payment_date).map(|dt| dt.to_rfc3339()))
        .bind(record.version)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save service record")?;
        Ok(())
    }

    /// Replace a whole record, provided the stored version still equals
    /// `expected_version`. Returns false when another writer got there first.
    pub async fn replace_record(
        &self,
        record: &ServiceRecord,
        expected_version: i64,
    ) -> Result<bool> {
        let payments_json = serde_json::to_string(&record.payments)?;
        let details_json = serde_json::to_string(&record.details)?;
        let pricing = record.pricing.as_ref();

        let result = sqlx::query(
            r#"
            UPDATE service_records
            SET service_category = ?, client_name = ?, client_phone = ?, client_email = ?,
                status = ?, details = ?, payments = ?,
                total_payment = ?, current_receiving_payment = ?, remaining_amount = ?,
                last_payment_method = ?, last_payment_account = ?, last_payer_name = ?,
                last_payment_date = ?, version = ?, updated_at = ?
            WHERE id = ? AND kind = ? AND version = ?
            "#,
        )
        .bind(&record.service_category)
        .bind(&record.client.name)
        .bind(&record.client.phone)
        .bind(&record.client.email)
        .bind(record.status.as_str())
        .bind(&details_json)
        .bind(&payments_json)
        .bind(pricing.map(|p| p.total_payment))
        .bind(pricing.map(|p| p.current_receiving_payment))
        .bind(pricing.map(|p| p.remaining_amount))
        .bind(pricing.and_then(|p| p.last_payment_method).map(|m| m.as_str()))
        .bind(pricing.and_then(|p| p.last_payment_account.clone()))
        .bind(pricing.and_then(|p| p.last_payer_name.clone()))
        .bind(pricing.and_then(|p| p.last_payment_date).map(|dt| dt.to_rfc3339()))
        .bind(record.version)
        .bind(record.updated_at.to_rfc3339())
        .bind(record.id.to_string())
        .bind(record.kind().as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .context("Failed to replace service record")?;

        Ok(result.rows_affected() == 1)
    }

    /// Load a record of the given kind by ID.
    pub async fn load_record(&self, kind: RecordKind, id: RecordId) -> Result<Option<ServiceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM service_records WHERE kind = ? AND id = ?",
            RECORD_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch service record")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    /// List records, optionally restricted to one kind, oldest first.
    pub async fn list_records(&self, kind: Option<RecordKind>) -> Result<Vec<ServiceRecord>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(&format!(
                    "SELECT {} FROM service_records WHERE kind = ? ORDER BY created_at, id",
                    RECORD_COLUMNS
                ))
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM service_records ORDER BY created_at, id",
                    RECORD_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list service records")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceRecord> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("kind");
        let status_str: String = row.get("status");
        let details_json: String = row.get("details");
        let payments_json: String = row.get("payments");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        let details: RecordDetails =
            serde_json::from_str(&details_json).context("Invalid record details")?;
        let kind = RecordKind::from_str(&kind_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid record kind: {}", kind_str))?;
        if details.kind() != kind {
            anyhow::bail!(
                "Record {} stored as {} but details describe {}",
                id_str,
                kind,
                details.kind()
            );
        }

        let payments: Vec<PaymentRecord> =
            serde_json::from_str(&payments_json).context("Invalid payments JSON")?;

        let total_payment: Option<Cents> = row.get("total_payment");
        let pricing = match total_payment {
            Some(total_payment) => {
                let method_str: Option<String> = row.get("last_payment_method");
                let date_str: Option<String> = row.get("last_payment_date");
                Some(PricingSnapshot {
                    total_payment,
                    current_receiving_payment: row
                        .get::<Option<Cents>, _>("current_receiving_payment")
                        .unwrap_or(0),
                    remaining_amount: row
                        .get::<Option<Cents>, _>("remaining_amount")
                        .unwrap_or(total_payment),
                    last_payment_method: method_str
                        .map(|s| {
                            PaymentMethod::from_str(&s)
                                .ok_or_else(|| anyhow::anyhow!("Invalid payment method: {}", s))
                        })
                        .transpose()?,
                    last_payment_account: row.get("last_payment_account"),
                    last_payer_name: row.get("last_payer_name"),
                    last_payment_date: date_str
                        .map(|s| DateTime::parse_from_rfc3339(&s))
                        .transpose()
                        .context("Invalid last_payment_date")?
                        .map(|dt| dt.with_timezone(&Utc)),
                })
            }
            None => None,
        };

        Ok(ServiceRecord {
            id: Uuid::parse_str(&id_str).context("Invalid record ID")?,
            service_category: row.get("service_category"),
            client: ClientIdentity {
                name: row.get("client_name"),
                phone: row.get("client_phone"),
                email: row.get("client_email"),
            },
            status: RecordStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid record status: {}", status_str))?,
            details,
            payments,
            pricing,
            version: row.get("version"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_at_str)
                .context("Invalid updated_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Price catalog operations
    // ========================

    /// Insert or update the catalog price for a service title.
    pub async fn set_catalog_price(&self, service_title: &str, price: Cents) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_catalog (service_title, price_cents, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(service_title) DO UPDATE SET
                price_cents = excluded.price_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(service_title)
        .bind(price)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save catalog price")?;
        Ok(())
    }

    /// Get the catalog price for a service title, if listed.
    pub async fn get_catalog_price(&self, service_title: &str) -> Result<Option<Cents>> {
        let row = sqlx::query("SELECT price_cents FROM price_catalog WHERE service_title = ?")
            .bind(service_title)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch catalog price")?;

        Ok(row.map(|r| r.get("price_cents")))
    }

    /// List the whole catalog, ordered by title.
    pub async fn list_catalog(&self) -> Result<Vec<(String, Cents)>> {
        let rows = sqlx::query("SELECT service_title, price_cents FROM price_catalog ORDER BY service_title")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list price catalog")?;

        Ok(rows
            .iter()
            .map(|r| (r.get("service_title"), r.get("price_cents")))
            .collect())
    }

    // ========================
    // Payroll operations
    // ========================

    /// Save a new payroll entry.
    pub async fn save_payroll_entry(&self, entry: &PayrollEntry) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO payroll_entries ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            PAYROLL_COLUMNS
        ))
        .bind(entry.id.to_string())
        .bind(&entry.employee_name)
        .bind(entry.salary)
        .bind(&entry.period)
        .bind(entry.status.as_str())
        .bind(entry.paid_at.map(|dt| dt.to_rfc3339()))
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save payroll entry")?;
        Ok(())
    }

    /// Mark a pending payroll entry as paid. Returns false if no pending entry matched.
    pub async fn mark_payroll_paid(&self, id: PayrollId, paid_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE payroll_entries SET status = 'paid', paid_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(paid_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to mark payroll entry paid")?;

        Ok(result.rows_affected() == 1)
    }

    /// List payroll entries, optionally filtered by status, most recent first.
    pub async fn list_payroll(&self, status: Option<PayrollStatus>) -> Result<Vec<PayrollEntry>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM payroll_entries WHERE status = ? ORDER BY COALESCE(paid_at, created_at) DESC, id",
                    PAYROLL_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM payroll_entries ORDER BY COALESCE(paid_at, created_at) DESC, id",
                    PAYROLL_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list payroll entries")?;

        rows.iter().map(Self::row_to_payroll).collect()
    }

    fn row_to_payroll(row: &sqlx::sqlite::SqliteRow) -> Result<PayrollEntry> {
        let id_str: String = row.get("id");
        let status_str: String = row.get("status");
        let paid_at_str: Option<String> = row.get("paid_at");
        let created_at_str: String = row.get("created_at");

        Ok(PayrollEntry {
            id: Uuid::parse_str(&id_str).context("Invalid payroll ID")?,
            employee_name: row.get("employee_name"),
            salary: row.get("salary_cents"),
            period: row.get("period"),
            status: PayrollStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid payroll status: {}", status_str))?,
            paid_at: paid_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid paid_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
