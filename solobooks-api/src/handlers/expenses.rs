//! Expense CRUD handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use solobooks_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateExpenseRequest, ListExpensesQuery, UpdateExpenseRequest},
    middleware::AuthUser,
    models::{CreateExpense, Expense, ListExpensesFilter, UpdateExpense},
    AppState,
};

pub async fn create_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    payload.validate()?;

    if let Some(project_id) = payload.project_id {
        state
            .db
            .get_project(auth.user_id, project_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;
    }

    let input = CreateExpense {
        user_id: auth.user_id,
        project_id: payload.project_id,
        category: payload.category,
        amount: payload.amount,
        expense_date: payload.expense_date,
        description: payload.description,
    };

    let expense = state.db.create_expense(&input).await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListExpensesQuery>,
) -> Result<Json<Vec<Expense>>, AppError> {
    let filter = ListExpensesFilter {
        project_id: query.project_id,
        category: query.category,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let expenses = state.db.list_expenses(auth.user_id, &filter).await?;

    Ok(Json(expenses))
}

pub async fn update_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<UpdateExpenseRequest>,
) -> Result<Json<Expense>, AppError> {
    payload.validate()?;

    let input = UpdateExpense {
        project_id: payload.project_id,
        category: payload.category,
        amount: payload.amount,
        expense_date: payload.expense_date,
        description: payload.description,
    };

    let expense = state
        .db
        .update_expense(auth.user_id, expense_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Expense not found")))?;

    Ok(Json(expense))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_expense(auth.user_id, expense_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Expense not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
