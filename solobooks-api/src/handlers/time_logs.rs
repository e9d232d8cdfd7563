//! Time log handlers.
//!
//! Invoiced logs are immutable: `PUT` and `DELETE` on them return a 400
//! from the database layer so billed hours stay auditable.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use solobooks_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateTimeLogRequest, ListTimeLogsQuery, UnbilledQuery, UpdateTimeLogRequest},
    middleware::AuthUser,
    models::{CreateTimeLog, TimeLog, UpdateTimeLog},
    AppState,
};

pub async fn create_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateTimeLogRequest>,
) -> Result<(StatusCode, Json<TimeLog>), AppError> {
    payload.validate()?;

    state
        .db
        .get_project(auth.user_id, payload.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let input = CreateTimeLog {
        user_id: auth.user_id,
        project_id: payload.project_id,
        log_date: payload.log_date,
        hours: payload.hours,
        description: payload.description,
        billable: payload.billable,
    };

    let time_log = state.db.create_time_log(&input).await?;

    Ok((StatusCode::CREATED, Json(time_log)))
}

pub async fn get_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(time_log_id): Path<Uuid>,
) -> Result<Json<TimeLog>, AppError> {
    let time_log = state
        .db
        .get_time_log(auth.user_id, time_log_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Time log not found")))?;

    Ok(Json(time_log))
}

pub async fn list_time_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListTimeLogsQuery>,
) -> Result<Json<Vec<TimeLog>>, AppError> {
    let time_logs = state
        .db
        .list_time_logs(auth.user_id, query.project_id, query.page_size, query.page_token)
        .await?;

    Ok(Json(time_logs))
}

/// List the billable, not-yet-invoiced logs for a project. This is the
/// set an invoice generation would consume.
pub async fn get_unbilled(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UnbilledQuery>,
) -> Result<Json<Vec<TimeLog>>, AppError> {
    state
        .db
        .get_project(auth.user_id, query.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    let time_logs = state.db.find_unbilled(auth.user_id, query.project_id).await?;

    Ok(Json(time_logs))
}

pub async fn update_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(time_log_id): Path<Uuid>,
    Json(payload): Json<UpdateTimeLogRequest>,
) -> Result<Json<TimeLog>, AppError> {
    payload.validate()?;

    let input = UpdateTimeLog {
        log_date: payload.log_date,
        hours: payload.hours,
        description: payload.description,
        billable: payload.billable,
    };

    let time_log = state
        .db
        .update_time_log(auth.user_id, time_log_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Time log not found")))?;

    Ok(Json(time_log))
}

pub async fn delete_time_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(time_log_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_time_log(auth.user_id, time_log_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Time log not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
