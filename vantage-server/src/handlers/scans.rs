use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vantage_core::dispatcher::CreateScanRequest;
use vantage_core::store::{FindingStore, ScanStore};
use vantage_core::tools::TargetKind;
use vantage_model::{Finding, ProjectId, Scan, ScanId};

use crate::errors::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScanBody {
    pub target: String,
    #[serde(default)]
    pub tools: Vec<String>,
    pub project_id: Option<ProjectId>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub id: String,
    pub name: String,
    pub supported_targets: Vec<String>,
}

pub async fn create_scan_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateScanBody>,
) -> Result<impl IntoResponse, ApiError> {
    if TargetKind::detect(&body.target).is_none() {
        return Err(ApiError::unprocessable(format!(
            "target is not a domain, ip, or email: {}",
            body.target
        )));
    }
    if body.tools.is_empty() {
        return Err(ApiError::unprocessable("tool list must not be empty"));
    }

    let scan = state
        .dispatcher
        .create_scan(CreateScanRequest {
            target: body.target,
            tools: body.tools,
            project_id: body.project_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(scan))))
}

pub async fn list_scans_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Scan>>>, ApiError> {
    let scans = state
        .stores
        .scans
        .list_scans(query.limit.unwrap_or(50))
        .await?;
    Ok(Json(ApiResponse::success(scans)))
}

pub async fn get_scan_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Scan>>, ApiError> {
    let scan = state
        .stores
        .scans
        .get_scan(ScanId(scan_id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("scan {scan_id}")))?;
    Ok(Json(ApiResponse::success(scan)))
}

pub async fn list_findings_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Finding>>>, ApiError> {
    let scan_id = ScanId(scan_id);
    state
        .stores
        .scans
        .get_scan(scan_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("scan {scan_id}")))?;
    let findings = state.stores.findings.findings_for_scan(scan_id).await?;
    Ok(Json(ApiResponse::success(findings)))
}

pub async fn delete_scan_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let scan_id = ScanId(scan_id);
    let scan = state
        .stores
        .scans
        .get_scan(scan_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("scan {scan_id}")))?;
    if scan.status.is_active() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("scan {scan_id} is {}; stop it first", scan.status),
        ));
    }
    // Cascades to the scan's findings.
    state.stores.scans.delete_scan(scan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_scan_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scan = state.dispatcher.start(ScanId(scan_id)).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(scan))))
}

pub async fn stop_scan_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.dispatcher.stop(ScanId(scan_id)).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(serde_json::json!({
            "scan_id": scan_id,
            "stop_requested": true,
        }))),
    ))
}

pub async fn list_tools_handler(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<ToolInfo>>> {
    let tools = state
        .dispatcher
        .registry()
        .descriptors()
        .into_iter()
        .map(|descriptor| ToolInfo {
            id: descriptor.id.to_string(),
            name: descriptor.name.to_string(),
            supported_targets: descriptor
                .supported_targets
                .iter()
                .map(|kind| {
                    match kind {
                        TargetKind::Domain => "domain",
                        TargetKind::Ip => "ip",
                        TargetKind::Email => "email",
                    }
                    .to_string()
                })
                .collect(),
        })
        .collect();
    Json(ApiResponse::success(tools))
}
