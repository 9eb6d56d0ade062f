//! Plain CRUD for client and project records. No orchestration logic lives
//! here; scans merely reference these rows.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use vantage_core::store::{ClientStore, ProjectStore};
use vantage_model::{Client, ClientId, Project};

use crate::errors::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateClientBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectBody {
    pub name: String,
    pub client_id: Option<ClientId>,
}

pub async fn create_client_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateClientBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::unprocessable("client name must not be empty"));
    }
    let client = Client::new(body.name.trim());
    state.stores.clients.create_client(&client).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(client))))
}

pub async fn list_clients_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Client>>>, ApiError> {
    let clients = state.stores.clients.list_clients().await?;
    Ok(Json(ApiResponse::success(clients)))
}

pub async fn create_project_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateProjectBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::unprocessable("project name must not be empty"));
    }
    let project = Project::new(body.name.trim(), body.client_id);
    state.stores.projects.create_project(&project).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(project))))
}

pub async fn list_projects_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = state.stores.projects.list_projects().await?;
    Ok(Json(ApiResponse::success(projects)))
}
