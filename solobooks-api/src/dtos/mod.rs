//! Request/response types for solobooks-api.
//!
//! Validation happens here, before anything reaches the billing core or
//! the database: handlers call `payload.validate()?` and surface failures
//! as a 400 with the aggregated field messages.

mod client;
mod expense;
mod invoice;
mod project;
mod time_log;

pub use client::{ClientRequest, ListClientsQuery, UpdateClientRequest};
pub use expense::{CreateExpenseRequest, ListExpensesQuery, UpdateExpenseRequest};
pub use invoice::{
    CreateInvoiceRequest, GenerateInvoiceRequest, InvoiceDetailResponse, LineItemRequest,
    ListInvoicesQuery, MarkPaidRequest,
};
pub use project::{CreateProjectRequest, ListProjectsQuery, UpdateProjectRequest};
pub use time_log::{
    CreateTimeLogRequest, ListTimeLogsQuery, UnbilledQuery, UpdateTimeLogRequest,
};

use rust_decimal::Decimal;
use validator::ValidationError;

pub(crate) fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("positive")
            .with_message("value must be greater than zero".into()));
    }
    Ok(())
}

pub(crate) fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("non_negative")
            .with_message("value must not be negative".into()));
    }
    Ok(())
}

pub(crate) fn validate_tax_rate(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::from(100) {
        return Err(ValidationError::new("tax_rate")
            .with_message("tax rate must be between 0 and 100".into()));
    }
    Ok(())
}

pub(crate) fn validate_hours(value: &Decimal) -> Result<(), ValidationError> {
    let min = Decimal::new(1, 1); // 0.1
    if *value < min || *value > Decimal::from(24) {
        return Err(ValidationError::new("hours")
            .with_message("hours must be between 0.1 and 24".into()));
    }
    Ok(())
}

fn default_page_size() -> i32 {
    50
}
