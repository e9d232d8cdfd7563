use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{default_page_size, validate_positive};

/// Body for `POST /expense`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,

    #[validate(custom(function = "validate_positive", message = "Amount must be greater than zero"))]
    pub amount: Decimal,

    pub expense_date: NaiveDate,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Body for `PUT /expense/:id`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExpenseRequest {
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100, message = "Category must not be empty"))]
    pub category: Option<String>,

    #[validate(custom(function = "validate_positive", message = "Amount must be greater than zero"))]
    pub amount: Option<Decimal>,

    pub expense_date: Option<NaiveDate>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Query parameters for `GET /expense`.
#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    pub project_id: Option<Uuid>,
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
