use axum::Router;
use axum::routing::{get, post, put};

use crate::AppState;
use crate::handlers::{exports, logs, records, scans, schedules};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        // Scan lifecycle
        .route(
            "/scans",
            post(scans::create_scan_handler).get(scans::list_scans_handler),
        )
        .route(
            "/scans/{id}",
            get(scans::get_scan_handler).delete(scans::delete_scan_handler),
        )
        .route("/scans/{id}/findings", get(scans::list_findings_handler))
        .route("/scans/{id}/start", post(scans::start_scan_handler))
        .route("/scans/{id}/stop", post(scans::stop_scan_handler))
        .route("/scans/{id}/logs", get(logs::scan_logs_sse_handler))
        // Tool catalog
        .route("/tools", get(scans::list_tools_handler))
        // Recurring schedules
        .route(
            "/schedules",
            post(schedules::create_schedule_handler)
                .get(schedules::list_schedules_handler),
        )
        .route(
            "/schedules/{id}",
            put(schedules::update_schedule_handler)
                .delete(schedules::delete_schedule_handler),
        )
        // Client / project records
        .route(
            "/clients",
            post(records::create_client_handler).get(records::list_clients_handler),
        )
        .route(
            "/projects",
            post(records::create_project_handler)
                .get(records::list_projects_handler),
        )
        // Report export
        .route("/exports/{id}/csv", get(exports::export_scan_csv_handler))
}
