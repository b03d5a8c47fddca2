mod repository;

pub use repository::*;

/// SQL migration for service records
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for the price catalog and payroll ledger
pub const MIGRATION_002_COLLABORATORS: &str = include_str!("migrations/002_collaborators.sql");
