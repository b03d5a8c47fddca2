// Application layer - use cases and orchestration
// LedgerService owns every record mutation; AggregationEngine is read-only.

pub mod aggregation;
pub mod collaborators;
pub mod error;
pub mod locks;
pub mod reporting;
pub mod service;

pub use aggregation::*;
pub use collaborators::*;
pub use error::*;
pub use locks::*;
pub use reporting::*;
pub use service::*;
