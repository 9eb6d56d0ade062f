pub mod v1;

use axum::Router;
use axum::routing::get;

use crate::AppState;

async fn health() -> &'static str {
    "ok"
}

/// Create the main API router with all versions
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", v1::create_v1_router())
        .with_state(state)
}
