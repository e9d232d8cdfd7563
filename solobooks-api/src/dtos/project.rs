use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::ProjectStatus;

use super::{default_page_size, validate_non_negative};

/// Body for `POST /project`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    pub client_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_non_negative", message = "Hourly rate must not be negative"))]
    pub hourly_rate: Decimal,
}

/// Body for `PUT /project/:id`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must not be empty"))]
    pub name: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_non_negative", message = "Hourly rate must not be negative"))]
    pub hourly_rate: Option<Decimal>,

    pub status: Option<ProjectStatus>,
}

/// Query parameters for `GET /project`.
#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub client_id: Option<Uuid>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
