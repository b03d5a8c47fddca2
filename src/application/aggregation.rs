use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{Cents, PayrollEntry, PricingSnapshot, ServiceRecord, checked_sum};
use crate::storage::Repository;

use super::{
    AppError, BreakdownRow, FinancialSummary, PayrollLedger, PriceCatalog, ServiceBreakdown,
};

/// Number of paid payroll entries carried in a summary.
pub const LATEST_PAYROLL_LIMIT: usize = 5;

/// A record paired with the snapshot it is reported with.
#[derive(Debug, Clone)]
pub struct PricedRecord {
    pub record: ServiceRecord,
    pub pricing: PricingSnapshot,
}

/// Read-only reporting pass over every record kind and the payroll ledger.
/// Takes no record locks; each record is read as one whole row.
pub struct AggregationEngine {
    repo: Repository,
    catalog: Arc<dyn PriceCatalog>,
    payroll: Arc<dyn PayrollLedger>,
}

impl AggregationEngine {
    pub fn new(
        repo: Repository,
        catalog: Arc<dyn PriceCatalog>,
        payroll: Arc<dyn PayrollLedger>,
    ) -> Self {
        Self {
            repo,
            catalog,
            payroll,
        }
    }

    /// Totals across all records, with profit against paid salaries.
    #[instrument(skip(self))]
    pub async fn compute_summary(&self) -> Result<FinancialSummary, AppError> {
        let priced = self.load_priced_records().await?;
        let paid = self.load_paid_payroll().await?;

        let summary = summarize(&priced, paid)?;
        info!(
            records = summary.record_count,
            revenue = summary.total_revenue,
            received = summary.total_received,
            salary_paid = summary.salary_paid,
            "Financial summary computed"
        );
        Ok(summary)
    }

    /// Every record as a normalized row, grouped by record kind.
    #[instrument(skip(self))]
    pub async fn compute_service_breakdown(&self) -> Result<ServiceBreakdown, AppError> {
        let priced = self.load_priced_records().await?;

        let breakdown = breakdown(&priced);
        info!(rows = breakdown.len(), "Service breakdown computed");
        Ok(breakdown)
    }

    /// Summary and breakdown built from a single read of the records, so the
    /// two always describe the same state.
    #[instrument(skip(self))]
    pub async fn compute_report(&self) -> Result<(FinancialSummary, ServiceBreakdown), AppError> {
        let priced = self.load_priced_records().await?;
        let paid = self.load_paid_payroll().await?;

        let summary = summarize(&priced, paid)?;
        let breakdown = breakdown(&priced);
        info!(
            records = summary.record_count,
            rows = breakdown.len(),
            "Report computed"
        );
        Ok((summary, breakdown))
    }

    async fn load_paid_payroll(&self) -> Result<Vec<PayrollEntry>, AppError> {
        self.payroll
            .list_paid()
            .await
            .map_err(|e| AppError::AggregationDependency {
                dependency: "payroll",
                reason: e.to_string(),
            })
    }

    /// Load all records and resolve a snapshot for each, falling back to the
    /// catalog for records that have none. Lookups are cached per title.
    async fn load_priced_records(&self) -> Result<Vec<PricedRecord>, AppError> {
        let records = self.repo.list_records(None).await?;
        let mut prices: HashMap<String, Cents> = HashMap::new();
        let mut priced = Vec::with_capacity(records.len());

        for record in records {
            let pricing = match &record.pricing {
                Some(pricing) => pricing.clone(),
                None => {
                    let price = match record.details.catalog_title() {
                        Some(title) => match prices.get(title) {
                            Some(price) => *price,
                            None => {
                                let price = self.catalog.lookup(title).await.map_err(|e| {
                                    AppError::AggregationDependency {
                                        dependency: "price_catalog",
                                        reason: e.to_string(),
                                    }
                                })?;
                                prices.insert(title.to_string(), price);
                                price
                            }
                        },
                        None => 0,
                    };
                    record
                        .ledger_state(price)
                        .map_err(|e| AppError::from_ledger(record.id, e))?
                        .pricing
                }
            };
            priced.push(PricedRecord { record, pricing });
        }

        Ok(priced)
    }
}

/// Fold priced records and paid payroll into a summary.
/// Fails with `AmountOverflow` if any total does not fit in `Cents`.
pub fn summarize(
    priced: &[PricedRecord],
    paid_payroll: Vec<PayrollEntry>,
) -> Result<FinancialSummary, AppError> {
    let total_revenue = checked_sum(priced.iter().map(|p| p.pricing.total_payment))
        .ok_or(AppError::AmountOverflow("total revenue"))?;
    let total_received = checked_sum(priced.iter().map(|p| p.pricing.current_receiving_payment))
        .ok_or(AppError::AmountOverflow("total received"))?;
    let total_pending = checked_sum(priced.iter().map(|p| p.pricing.remaining_amount))
        .ok_or(AppError::AmountOverflow("total pending"))?;

    // Each category total is bounded by total_revenue
    let mut revenue_by_service: BTreeMap<String, Cents> = BTreeMap::new();
    for item in priced {
        *revenue_by_service
            .entry(item.record.service_category.clone())
            .or_insert(0) += item.pricing.total_payment;
    }

    let mut paid: Vec<PayrollEntry> = paid_payroll.into_iter().filter(|p| p.is_paid()).collect();
    let salary_paid = checked_sum(paid.iter().map(|p| p.salary))
        .ok_or(AppError::AmountOverflow("salary paid"))?;
    let total_profit = total_received
        .checked_sub(salary_paid)
        .ok_or(AppError::AmountOverflow("total profit"))?;

    // Most recent first; entries without a payment date sort last
    paid.sort_by(|a, b| {
        b.paid_at
            .cmp(&a.paid_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    paid.truncate(LATEST_PAYROLL_LIMIT);

    Ok(FinancialSummary {
        total_revenue,
        total_received,
        total_pending,
        salary_paid,
        total_profit,
        revenue_by_service,
        latest_payrolls: paid,
        record_count: priced.len(),
    })
}

/// Project every priced record into its kind's bucket.
pub fn breakdown(priced: &[PricedRecord]) -> ServiceBreakdown {
    let mut breakdown = ServiceBreakdown::default();
    for item in priced {
        breakdown.push(project_row(item));
    }
    breakdown
}

/// Project a priced record onto the shared breakdown row.
pub fn project_row(item: &PricedRecord) -> BreakdownRow {
    let record = &item.record;
    let pricing = &item.pricing;
    BreakdownRow {
        record_id: record.id,
        kind: record.kind(),
        service_category: record.service_category.clone(),
        name: record.client.name.clone(),
        phone: record.client.phone.clone(),
        total_payment: pricing.total_payment,
        current_receiving_payment: pricing.current_receiving_payment,
        remaining_amount: pricing.remaining_amount,
        payment_method: pricing.last_payment_method,
        account_number: pricing.last_payment_account.clone(),
        payer_name: pricing.last_payer_name.clone(),
        payment_date: pricing.last_payment_date,
        payments: record.payments.clone(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::{
        ClientIdentity, PaymentDraft, PaymentMethod, RecordDetails, recompute_snapshot,
    };

    fn priced(category: &str, total: Cents, received: &[Cents]) -> PricedRecord {
        let mut record = ServiceRecord::new(
            RecordDetails::Manual,
            category,
            ClientIdentity::new("Client"),
            Some(total),
        );
        for amount in received {
            record
                .add_payment(PaymentDraft::new(
                    *amount,
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    PaymentMethod::Cash,
                ))
                .unwrap();
        }
        let pricing = recompute_snapshot(total, &record.payments).unwrap();
        PricedRecord { record, pricing }
    }

    fn paid(salary: Cents, day: u32) -> PayrollEntry {
        PayrollEntry::new("Staff", salary, "2024-01")
            .mark_paid(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_summary_totals() {
        let records = vec![
            priced("Visa", 1000, &[1000]),
            priced("Visa", 2000, &[]),
            priced("Passport", 3000, &[1000, 500]),
        ];

        let summary = summarize(&records, vec![paid(300, 1), paid(200, 2)]).unwrap();

        assert_eq!(summary.total_revenue, 6000);
        assert_eq!(summary.total_received, 2500);
        assert_eq!(summary.total_pending, 3500);
        assert_eq!(summary.salary_paid, 500);
        assert_eq!(summary.total_profit, 2000);
        assert_eq!(summary.revenue_by_service.get("Visa"), Some(&3000));
        assert_eq!(summary.revenue_by_service.get("Passport"), Some(&3000));
        assert_eq!(summary.record_count, 3);
    }

    #[test]
    fn test_pending_payroll_is_ignored() {
        let pending = PayrollEntry::new("Staff", 9999, "2024-02");
        let summary = summarize(&[], vec![paid(100, 1), pending]).unwrap();

        assert_eq!(summary.salary_paid, 100);
        assert_eq!(summary.total_profit, -100);
        assert_eq!(summary.latest_payrolls.len(), 1);
    }

    #[test]
    fn test_latest_payrolls_are_most_recent_first() {
        let entries: Vec<PayrollEntry> = (1..=7).map(|day| paid(10, day)).collect();
        let summary = summarize(&[], entries).unwrap();

        let days: Vec<u32> = summary
            .latest_payrolls
            .iter()
            .map(|p| chrono::Datelike::day(&p.paid_at.unwrap()))
            .collect();
        assert_eq!(days, vec![7, 6, 5, 4, 3]);
        assert_eq!(summary.salary_paid, 70);
    }

    #[test]
    fn test_categories_are_not_normalized() {
        let records = vec![priced("Visa", 100, &[]), priced("visa ", 50, &[])];
        let summary = summarize(&records, vec![]).unwrap();

        assert_eq!(summary.revenue_by_service.len(), 2);
    }

    #[test]
    fn test_summary_overflow_is_an_error() {
        let records = vec![
            priced("Visa", i64::MAX, &[]),
            priced("Passport", 1, &[]),
        ];
        let result = summarize(&records, vec![]);
        assert!(matches!(result, Err(AppError::AmountOverflow("total revenue"))));

        let result = summarize(&[], vec![paid(i64::MAX, 1), paid(1, 2)]);
        assert!(matches!(result, Err(AppError::AmountOverflow("salary paid"))));
    }

    #[test]
    fn test_breakdown_buckets_rows_by_kind() {
        let rows = breakdown(&[priced("Visa", 100, &[]), priced("Visa", 200, &[50])]);
        assert_eq!(rows.manual.len(), 2);
        assert!(rows.converted.is_empty());
        assert_eq!(rows.manual[1].current_receiving_payment, 50);
    }

    #[test]
    fn test_project_row_mirrors_last_payment() {
        let item = priced("Visa", 1000, &[100, 200]);
        let row = project_row(&item);

        assert_eq!(row.total_payment, 1000);
        assert_eq!(row.current_receiving_payment, 300);
        assert_eq!(row.remaining_amount, 700);
        assert_eq!(row.payment_method, Some(PaymentMethod::Cash));
        assert_eq!(row.payments.len(), 2);
        assert_eq!(row.name, "Client");
    }
}
