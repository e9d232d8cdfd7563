//! Client CRUD handlers. All operations are scoped to the authenticated user.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use solobooks_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{ClientRequest, ListClientsQuery, UpdateClientRequest},
    middleware::AuthUser,
    models::{Client, CreateClient, UpdateClient},
    AppState,
};

pub async fn create_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    payload.validate()?;

    let input = CreateClient {
        user_id: auth.user_id,
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        company: payload.company,
        address: payload.address,
    };

    let client = state.db.create_client(&input).await?;

    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    let client = state
        .db
        .get_client(auth.user_id, client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

pub async fn list_clients(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<Vec<Client>>, AppError> {
    let clients = state
        .db
        .list_clients(auth.user_id, query.page_size, query.page_token)
        .await?;

    Ok(Json(clients))
}

pub async fn update_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<UpdateClientRequest>,
) -> Result<Json<Client>, AppError> {
    payload.validate()?;

    let input = UpdateClient {
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        company: payload.company,
        address: payload.address,
    };

    let client = state
        .db
        .update_client(auth.user_id, client_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_client(auth.user_id, client_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
