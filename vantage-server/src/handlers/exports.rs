use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use uuid::Uuid;

use vantage_core::store::{FindingStore, ScanStore};
use vantage_model::ScanId;

use crate::errors::ApiError;
use crate::state::AppState;

/// Findings of one scan as a CSV attachment.
pub async fn export_scan_csv_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scan_id = ScanId(scan_id);
    state
        .stores
        .scans
        .get_scan(scan_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("scan {scan_id}")))?;
    let findings = state.stores.findings.findings_for_scan(scan_id).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["tool", "category", "value", "severity", "metadata"])
        .map_err(csv_error)?;
    for finding in &findings {
        writer
            .write_record([
                finding.tool.as_str(),
                finding.category.as_str(),
                finding.value.as_str(),
                finding.severity.as_str(),
                &finding.metadata.to_string(),
            ])
            .map_err(csv_error)?;
    }
    let body = writer
        .into_inner()
        .map_err(|err| csv_error(err.into_error().into()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"scan_{scan_id}.csv\""),
            ),
        ],
        body,
    ))
}

fn csv_error(err: csv::Error) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("csv rendering failed: {err}"),
    )
}
