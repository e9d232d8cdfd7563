//! Project CRUD handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use solobooks_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateProjectRequest, ListProjectsQuery, UpdateProjectRequest},
    middleware::AuthUser,
    models::{CreateProject, Project, UpdateProject},
    AppState,
};

pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    payload.validate()?;

    // The client must belong to the caller before attaching work to it.
    state
        .db
        .get_client(auth.user_id, payload.client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    let input = CreateProject {
        user_id: auth.user_id,
        client_id: payload.client_id,
        name: payload.name,
        description: payload.description,
        hourly_rate: payload.hourly_rate,
    };

    let project = state.db.create_project(&input).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let project = state
        .db
        .get_project(auth.user_id, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    Ok(Json(project))
}

pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = state
        .db
        .list_projects(auth.user_id, query.client_id, query.page_size, query.page_token)
        .await?;

    Ok(Json(projects))
}

pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    payload.validate()?;

    let input = UpdateProject {
        name: payload.name,
        description: payload.description,
        hourly_rate: payload.hourly_rate,
        status: payload.status,
    };

    let project = state
        .db
        .update_project(auth.user_id, project_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Project not found")))?;

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_project(auth.user_id, project_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Project not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
