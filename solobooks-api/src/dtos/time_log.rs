use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{default_page_size, validate_hours};

fn default_billable() -> bool {
    true
}

/// Body for `POST /timelog`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTimeLogRequest {
    pub project_id: Uuid,
    pub log_date: NaiveDate,

    #[validate(custom(function = "validate_hours"))]
    pub hours: Decimal,

    #[validate(length(min = 1, max = 500, message = "Description is required"))]
    pub description: String,

    #[serde(default = "default_billable")]
    pub billable: bool,
}

/// Body for `PUT /timelog/:id`. Only uninvoiced logs may change.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTimeLogRequest {
    pub log_date: Option<NaiveDate>,

    #[validate(custom(function = "validate_hours"))]
    pub hours: Option<Decimal>,

    #[validate(length(min = 1, max = 500, message = "Description must not be empty"))]
    pub description: Option<String>,

    pub billable: Option<bool>,
}

/// Query parameters for `GET /timelog`.
#[derive(Debug, Deserialize)]
pub struct ListTimeLogsQuery {
    pub project_id: Option<Uuid>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Query parameters for `GET /timelog/unbilled`.
#[derive(Debug, Deserialize)]
pub struct UnbilledQuery {
    pub project_id: Uuid,
}
