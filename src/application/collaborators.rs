use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{Cents, PayrollEntry, PayrollStatus};
use crate::storage::Repository;

/// Fixed price list used to bill processing records that have no snapshot.
#[async_trait]
pub trait PriceCatalog: Send + Sync {
    /// Price for `service_title`, or 0 when the title is not listed.
    /// An `Err` means the catalog itself could not be reached.
    async fn lookup(&self, service_title: &str) -> Result<Cents>;
}

/// Source of salary payments, used to compute profit.
#[async_trait]
pub trait PayrollLedger: Send + Sync {
    /// All payroll entries with status `Paid`.
    async fn list_paid(&self) -> Result<Vec<PayrollEntry>>;
}

#[async_trait]
impl PriceCatalog for Repository {
    async fn lookup(&self, service_title: &str) -> Result<Cents> {
        Ok(self.get_catalog_price(service_title).await?.unwrap_or(0))
    }
}

#[async_trait]
impl PayrollLedger for Repository {
    async fn list_paid(&self) -> Result<Vec<PayrollEntry>> {
        self.list_payroll(Some(PayrollStatus::Paid)).await
    }
}

/// In-memory catalog, for deployments that configure prices up front.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceCatalog {
    prices: HashMap<String, Cents>,
}

impl StaticPriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, service_title: impl Into<String>, price: Cents) -> Self {
        self.prices.insert(service_title.into(), price);
        self
    }
}

#[async_trait]
impl PriceCatalog for StaticPriceCatalog {
    async fn lookup(&self, service_title: &str) -> Result<Cents> {
        Ok(self.prices.get(service_title).copied().unwrap_or(0))
    }
}
