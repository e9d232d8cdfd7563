use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Invoice, InvoiceStatus, LateFeeType, LineItem, Payment};

use super::{default_page_size, validate_non_negative, validate_positive, validate_tax_rate};

/// One manually entered invoice row.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LineItemRequest {
    #[validate(length(min = 1, max = 500, message = "Description is required"))]
    pub description: String,

    #[validate(custom(function = "validate_positive", message = "Quantity must be greater than zero"))]
    pub quantity: Decimal,

    #[validate(custom(function = "validate_non_negative", message = "Rate must not be negative"))]
    pub rate: Decimal,
}

/// Body for `POST /invoice` (manual line items).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, message = "At least one line item is required"))]
    #[validate(nested)]
    pub items: Vec<LineItemRequest>,

    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,

    #[validate(custom(function = "validate_non_negative", message = "Discount must not be negative"))]
    pub discount_amount: Option<Decimal>,

    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,

    #[validate(custom(function = "validate_non_negative", message = "Late fee rate must not be negative"))]
    pub late_fee_rate: Option<Decimal>,
    pub late_fee_type: Option<LateFeeType>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Body for `POST /invoice/from-timelogs`.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateInvoiceRequest {
    pub project_id: Uuid,

    /// Overrides the project's default hourly rate when set.
    #[validate(custom(function = "validate_positive", message = "Hourly rate must be greater than zero"))]
    pub hourly_rate: Option<Decimal>,

    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,

    #[validate(custom(function = "validate_non_negative", message = "Discount must not be negative"))]
    pub discount_amount: Option<Decimal>,

    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,

    #[validate(custom(function = "validate_non_negative", message = "Late fee rate must not be negative"))]
    pub late_fee_rate: Option<Decimal>,
    pub late_fee_type: Option<LateFeeType>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Body for `PUT /invoice/:id/paid`. All fields default sensibly: amount
/// defaults to the invoice total, the date to today.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MarkPaidRequest {
    #[validate(custom(function = "validate_positive", message = "Payment amount must be greater than zero"))]
    pub amount: Option<Decimal>,
    pub payment_date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub method: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Query parameters for `GET /invoice`.
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Full invoice view: stored row, line items, and the read-time
/// projections (effective status, late fee accrued as of today).
#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub effective_status: InvoiceStatus,
    pub accrued_late_fee: Decimal,
}
