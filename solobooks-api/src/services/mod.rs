pub mod billing;
pub mod database;
pub mod metrics;

pub use billing::{BillableItem, BillingError, ComposedTotals};
pub use database::{Database, FinancialSummary};
pub use metrics::{get_metrics, init_metrics};
