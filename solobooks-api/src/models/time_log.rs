//! Time log model for solobooks-api.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A recorded work session on a project.
///
/// Once `invoiced` is set the row is frozen: updates and deletes are
/// rejected so billed hours stay auditable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimeLog {
    pub time_log_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub log_date: NaiveDate,
    pub hours: Decimal,
    pub description: String,
    pub billable: bool,
    pub invoiced: bool,
    pub invoice_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a time log.
#[derive(Debug, Clone)]
pub struct CreateTimeLog {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub log_date: NaiveDate,
    pub hours: Decimal,
    pub description: String,
    pub billable: bool,
}

/// Input for updating an uninvoiced time log.
#[derive(Debug, Clone, Default)]
pub struct UpdateTimeLog {
    pub log_date: Option<NaiveDate>,
    pub hours: Option<Decimal>,
    pub description: Option<String>,
    pub billable: Option<bool>,
}
