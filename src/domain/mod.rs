mod money;
mod payment;
mod payroll;
mod pricing;
mod record;

pub use money::*;
pub use payment::*;
pub use payroll::*;
pub use pricing::*;
pub use record::*;
