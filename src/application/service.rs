use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Cents, ClientIdentity, LedgerError, LedgerState, PaymentDraft, PaymentPatch, PaymentRecord,
    PayrollEntry, PayrollId, PayrollStatus, RecordDetails, RecordId, RecordKind, RecordStatus,
    ServiceRecord,
};
use crate::storage::Repository;

use super::{AggregationEngine, AppError, PayrollLedger, PriceCatalog, RecordLocks};

/// Application service owning every mutation of a record's payments.
/// This is the primary interface for any client (CLI, API, etc.).
pub struct LedgerService {
    repo: Repository,
    catalog: Arc<dyn PriceCatalog>,
    payroll: Arc<dyn PayrollLedger>,
    locks: RecordLocks,
}

/// Input for creating a service record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub details: RecordDetails,
    pub service_category: String,
    pub client: ClientIdentity,
    pub status: RecordStatus,
    /// Negotiated total; required for converted and manual records
    pub total_payment: Option<Cents>,
    pub initial_payment: Option<PaymentDraft>,
}

impl NewRecord {
    pub fn new(
        details: RecordDetails,
        service_category: impl Into<String>,
        client: ClientIdentity,
    ) -> Self {
        Self {
            details,
            service_category: service_category.into(),
            client,
            status: RecordStatus::Pending,
            total_payment: None,
            initial_payment: None,
        }
    }

    pub fn with_total(mut self, total_payment: Cents) -> Self {
        self.total_payment = Some(total_payment);
        self
    }

    pub fn with_initial_payment(mut self, draft: PaymentDraft) -> Self {
        self.initial_payment = Some(draft);
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }
}

impl LedgerService {
    /// Create a service whose catalog and payroll are backed by the same database.
    pub fn new(repo: Repository) -> Self {
        let catalog: Arc<dyn PriceCatalog> = Arc::new(repo.clone());
        let payroll: Arc<dyn PayrollLedger> = Arc::new(repo.clone());
        Self::with_collaborators(repo, catalog, payroll)
    }

    /// Create a service with external catalog and payroll collaborators.
    pub fn with_collaborators(
        repo: Repository,
        catalog: Arc<dyn PriceCatalog>,
        payroll: Arc<dyn PayrollLedger>,
    ) -> Self {
        Self {
            repo,
            catalog,
            payroll,
            locks: RecordLocks::new(),
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Read-only reporting over all records and the payroll ledger.
    pub fn reports(&self) -> AggregationEngine {
        AggregationEngine::new(
            self.repo.clone(),
            self.catalog.clone(),
            self.payroll.clone(),
        )
    }

    // ========================
    // Record operations
    // ========================

    /// Create a record, optionally with its first payment.
    #[instrument(skip(self, new), fields(kind = %new.details.kind(), category = %new.service_category))]
    pub async fn create_record(&self, new: NewRecord) -> Result<ServiceRecord, AppError> {
        if new.service_category.trim().is_empty() {
            return Err(AppError::Validation("service category is required".into()));
        }
        if new.client.name.trim().is_empty() {
            return Err(AppError::Validation("client name is required".into()));
        }

        let kind = new.details.kind();
        match new.total_payment {
            Some(total) if total < 0 => {
                return Err(AppError::Validation(format!(
                    "total payment cannot be negative (got {} cents)",
                    total
                )));
            }
            None if kind != RecordKind::Processing => {
                return Err(AppError::Validation(format!(
                    "{} records require a total payment",
                    kind
                )));
            }
            _ => {}
        }

        let mut record = ServiceRecord::new(
            new.details,
            new.service_category,
            new.client,
            new.total_payment,
        )
        .with_status(new.status);

        if let Some(draft) = new.initial_payment {
            if record.pricing.is_none() {
                let price = self.catalog_price(&record).await?;
                record
                    .ensure_pricing(price)
                    .map_err(|e| AppError::from_ledger(record.id, e))?;
            }
            record
                .add_payment(draft)
                .map_err(|e| AppError::from_ledger(record.id, e))?;
        }

        self.repo.insert_record(&record).await?;
        self.report_overpayment(&record);

        info!(record_id = %record.id, "Service record created");
        Ok(record)
    }

    /// Get a record by kind and ID.
    pub async fn get_record(&self, kind: RecordKind, id: RecordId) -> Result<ServiceRecord, AppError> {
        self.repo
            .load_record(kind, id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound {
                kind,
                id: id.to_string(),
            })
    }

    /// List records, optionally restricted to one kind.
    pub async fn list_records(&self, kind: Option<RecordKind>) -> Result<Vec<ServiceRecord>, AppError> {
        Ok(self.repo.list_records(kind).await?)
    }

    /// Change a record's workflow status. The ledger is unaffected.
    #[instrument(skip(self), fields(kind = %kind, record_id = %id))]
    pub async fn update_status(
        &self,
        kind: RecordKind,
        id: RecordId,
        status: RecordStatus,
    ) -> Result<ServiceRecord, AppError> {
        let _guard = self.locks.acquire(kind, id).await;
        let mut record = self.get_record(kind, id).await?;
        record.set_status(status);
        self.persist(&mut record).await?;

        info!(status = %status, "Record status updated");
        Ok(record)
    }

    // ========================
    // Ledger operations
    // ========================

    /// Append a payment and recompute the snapshot.
    #[instrument(skip(self, draft), fields(kind = %kind, record_id = %id, amount = draft.amount))]
    pub async fn add_payment(
        &self,
        kind: RecordKind,
        id: RecordId,
        draft: PaymentDraft,
    ) -> Result<LedgerState, AppError> {
        let (state, ()) = self
            .mutate(kind, id, |record| record.add_payment(draft))
            .await?;

        info!(
            payments = state.payments.len(),
            received = state.pricing.current_receiving_payment,
            remaining = state.pricing.remaining_amount,
            "Payment added"
        );
        Ok(state)
    }

    /// Update the provided fields of the payment at `index`.
    #[instrument(skip(self, patch), fields(kind = %kind, record_id = %id))]
    pub async fn edit_payment(
        &self,
        kind: RecordKind,
        id: RecordId,
        index: usize,
        patch: PaymentPatch,
    ) -> Result<LedgerState, AppError> {
        if patch.is_empty() {
            debug!("Empty payment patch, nothing to write");
            let state = self.get_payments(kind, id).await?;
            if index >= state.payments.len() {
                return Err(AppError::PaymentNotFound {
                    record_id: id.to_string(),
                    index,
                    len: state.payments.len(),
                });
            }
            return Ok(state);
        }

        let (state, ()) = self
            .mutate(kind, id, |record| record.edit_payment(index, patch))
            .await?;

        info!(
            received = state.pricing.current_receiving_payment,
            remaining = state.pricing.remaining_amount,
            "Payment edited"
        );
        Ok(state)
    }

    /// Remove the payment at `index`; remaining payments are relabelled.
    #[instrument(skip(self), fields(kind = %kind, record_id = %id))]
    pub async fn delete_payment(
        &self,
        kind: RecordKind,
        id: RecordId,
        index: usize,
    ) -> Result<LedgerState, AppError> {
        let (state, removed): (LedgerState, PaymentRecord) = self
            .mutate(kind, id, |record| record.delete_payment(index))
            .await?;

        info!(
            removed_amount = removed.amount,
            payments = state.payments.len(),
            remaining = state.pricing.remaining_amount,
            "Payment deleted"
        );
        Ok(state)
    }

    /// Revise the billed total (contract change) and recompute.
    #[instrument(skip(self), fields(kind = %kind, record_id = %id))]
    pub async fn update_total_payment(
        &self,
        kind: RecordKind,
        id: RecordId,
        total_payment: Cents,
    ) -> Result<LedgerState, AppError> {
        let (state, ()) = self
            .mutate(kind, id, |record| record.set_total_payment(total_payment))
            .await?;

        info!(
            remaining = state.pricing.remaining_amount,
            "Total payment updated"
        );
        Ok(state)
    }

    /// Current payments and snapshot of a record. Never writes.
    pub async fn get_payments(&self, kind: RecordKind, id: RecordId) -> Result<LedgerState, AppError> {
        let record = self.get_record(kind, id).await?;
        let fallback = match record.pricing {
            Some(_) => 0,
            None => self.catalog_price(&record).await?,
        };
        record
            .ledger_state(fallback)
            .map_err(|e| AppError::from_ledger(id, e))
    }

    /// Load, mutate and persist one record while holding its lock.
    async fn mutate<F, T>(&self, kind: RecordKind, id: RecordId, op: F) -> Result<(LedgerState, T), AppError>
    where
        F: FnOnce(&mut ServiceRecord) -> Result<T, LedgerError>,
    {
        let _guard = self.locks.acquire(kind, id).await;

        let mut record = self.get_record(kind, id).await?;
        if record.pricing.is_none() {
            let price = self.catalog_price(&record).await?;
            debug!(price, "Materializing snapshot from catalog price");
            record
                .ensure_pricing(price)
                .map_err(|e| AppError::from_ledger(id, e))?;
        }

        let value = op(&mut record).map_err(|e| AppError::from_ledger(id, e))?;
        self.persist(&mut record).await?;
        self.report_overpayment(&record);

        let state = record
            .ledger_state(0)
            .map_err(|e| AppError::from_ledger(id, e))?;
        Ok((state, value))
    }

    /// Write the record back, failing if the stored version moved underneath us.
    async fn persist(&self, record: &mut ServiceRecord) -> Result<(), AppError> {
        let expected = record.version;
        record.version += 1;

        if !self.repo.replace_record(record, expected).await? {
            record.version = expected;
            warn!(record_id = %record.id, expected, "Stale record version on save");
            return Err(AppError::ConcurrentModification(record.id.to_string()));
        }
        Ok(())
    }

    async fn catalog_price(&self, record: &ServiceRecord) -> Result<Cents, AppError> {
        match record.details.catalog_title() {
            Some(title) => {
                self.catalog
                    .lookup(title)
                    .await
                    .map_err(|e| AppError::AggregationDependency {
                        dependency: "price_catalog",
                        reason: e.to_string(),
                    })
            }
            None => Ok(0),
        }
    }

    fn report_overpayment(&self, record: &ServiceRecord) {
        if let Some(pricing) = &record.pricing {
            let over = pricing.overpayment();
            if over > 0 {
                warn!(
                    record_id = %record.id,
                    kind = %record.kind(),
                    total_payment = pricing.total_payment,
                    received = pricing.current_receiving_payment,
                    overpaid = over,
                    "Received more than billed; remaining amount clipped to zero"
                );
            }
        }
    }

    // ========================
    // Catalog operations
    // ========================

    /// Set the catalog price for a processing service title.
    pub async fn set_catalog_price(&self, service_title: &str, price: Cents) -> Result<(), AppError> {
        if service_title.trim().is_empty() {
            return Err(AppError::Validation("service title is required".into()));
        }
        if price < 0 {
            return Err(AppError::Validation("catalog price cannot be negative".into()));
        }
        self.repo.set_catalog_price(service_title, price).await?;
        Ok(())
    }

    /// List the stored price catalog.
    pub async fn list_catalog(&self) -> Result<Vec<(String, Cents)>, AppError> {
        Ok(self.repo.list_catalog().await?)
    }

    // ========================
    // Payroll operations
    // ========================

    /// Record a payroll entry, optionally already paid.
    pub async fn add_payroll_entry(
        &self,
        employee_name: String,
        salary: Cents,
        period: String,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<PayrollEntry, AppError> {
        if employee_name.trim().is_empty() {
            return Err(AppError::Validation("employee name is required".into()));
        }
        if salary < 0 {
            return Err(AppError::Validation("salary cannot be negative".into()));
        }

        let mut entry = PayrollEntry::new(employee_name, salary, period);
        if let Some(paid_at) = paid_at {
            entry = entry.mark_paid(paid_at);
        }
        self.repo.save_payroll_entry(&entry).await?;
        Ok(entry)
    }

    /// Mark a pending payroll entry as paid.
    pub async fn mark_payroll_paid(
        &self,
        id: PayrollId,
        paid_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !self.repo.mark_payroll_paid(id, paid_at).await? {
            return Err(AppError::PayrollEntryNotFound(id.to_string()));
        }
        Ok(())
    }

    /// List payroll entries, optionally by status.
    pub async fn list_payroll(
        &self,
        status: Option<PayrollStatus>,
    ) -> Result<Vec<PayrollEntry>, AppError> {
        Ok(self.repo.list_payroll(status).await?)
    }
}
