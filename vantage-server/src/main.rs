use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vantage_core::broker::LogBroker;
use vantage_core::cancel::CancellationCoordinator;
use vantage_core::dispatcher::ScanDispatcher;
use vantage_core::store::{Stores, postgres::PostgresStore};
use vantage_core::ticker::ScheduleTicker;
use vantage_core::tools::{ToolRegistry, ToolSettings};
use vantage_server::{AppState, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vantage=debug")),
        )
        .init();

    let settings = vantage_config::load().context("loading settings")?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await
        .context("connecting to Postgres")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;

    let stores = Stores::from_postgres(PostgresStore::new(pool).await?);
    let registry = Arc::new(
        ToolRegistry::builtin(&ToolSettings {
            hibp_api_key: settings.tool_apis.hibp_api_key.clone(),
            spiderfoot_url: settings.tool_apis.spiderfoot_url.clone(),
        })
        .context("building tool registry")?,
    );
    info!(tools = registry.len(), "tool registry ready");

    let broker = LogBroker::new();
    let cancel = CancellationCoordinator::new();
    let dispatcher = ScanDispatcher::new(
        stores.clone(),
        registry,
        broker,
        cancel,
        settings.workers.scan_permits,
    );

    ScheduleTicker::new(
        stores.schedules.clone(),
        Arc::new(dispatcher.clone()),
        Duration::from_secs(settings.workers.schedule_tick_secs),
    )
    .spawn();

    let state = AppState::new(dispatcher, stores);
    let app = routes::create_api_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.server.bind_addr))?;
    info!(addr = %settings.server.bind_addr, "vantage server listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
