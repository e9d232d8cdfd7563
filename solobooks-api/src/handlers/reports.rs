//! Reporting handlers.

use axum::{extract::State, Json};
use solobooks_core::error::AppError;

use crate::{middleware::AuthUser, services::database::FinancialSummary, AppState};

/// Financial snapshot for the authenticated user: outstanding invoice
/// total, collected total, unbilled billable hours and expenses to date.
pub async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<FinancialSummary>, AppError> {
    let summary = state.db.financial_summary(auth.user_id).await?;

    Ok(Json(summary))
}
