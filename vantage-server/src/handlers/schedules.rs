use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use vantage_core::store::{ScheduleStore, ScheduleUpdate};
use vantage_core::tools::TargetKind;
use vantage_model::{ProjectId, Schedule, ScheduleId};

use crate::errors::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScheduleBody {
    pub target: String,
    #[serde(default)]
    pub tools: Vec<String>,
    pub interval_minutes: u32,
    pub project_id: Option<ProjectId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleBody {
    pub target: Option<String>,
    pub tools: Option<Vec<String>>,
    pub interval_minutes: Option<u32>,
    pub enabled: Option<bool>,
}

pub async fn create_schedule_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateScheduleBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.interval_minutes == 0 {
        return Err(ApiError::unprocessable("interval_minutes must be positive"));
    }
    if TargetKind::detect(&body.target).is_none() {
        return Err(ApiError::unprocessable(format!(
            "target is not a domain, ip, or email: {}",
            body.target
        )));
    }

    let schedule = Schedule::new(
        body.target,
        body.tools,
        body.interval_minutes,
        body.project_id,
    );
    state.stores.schedules.create_schedule(&schedule).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(schedule))))
}

pub async fn list_schedules_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Schedule>>>, ApiError> {
    let schedules = state.stores.schedules.list_schedules().await?;
    Ok(Json(ApiResponse::success(schedules)))
}

pub async fn update_schedule_handler(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
    Json(body): Json<UpdateScheduleBody>,
) -> Result<Json<ApiResponse<Schedule>>, ApiError> {
    if body.interval_minutes == Some(0) {
        return Err(ApiError::unprocessable("interval_minutes must be positive"));
    }

    let updated = state
        .stores
        .schedules
        .update_schedule(
            ScheduleId(schedule_id),
            ScheduleUpdate {
                target: body.target,
                tools: body.tools,
                interval_minutes: body.interval_minutes,
                enabled: body.enabled,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found(format!("schedule {schedule_id}")))?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_schedule_handler(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .stores
        .schedules
        .delete_schedule(ScheduleId(schedule_id))
        .await?;
    if !deleted {
        return Err(ApiError::not_found(format!("schedule {schedule_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
