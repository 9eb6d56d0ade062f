use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;
use uuid::Uuid;

use vantage_core::store::ScanStore;
use vantage_model::ScanId;

use crate::errors::ApiError;
use crate::state::AppState;

/// Live log subscription: an SSE stream of the scan's log lines from the
/// moment of attachment until the subscriber disconnects or the scan
/// reaches a terminal state and its channel closes. Lines published during
/// a subscriber's absence are not replayed.
pub async fn scan_logs_sse_handler(
    State(state): State<AppState>,
    Path(scan_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let scan_id = ScanId(scan_id);
    state
        .stores
        .scans
        .get_scan(scan_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("scan {scan_id}")))?;

    let receiver = state.broker.subscribe(scan_id);
    let stream = BroadcastStream::new(receiver).filter_map(move |frame| {
        match frame {
            Ok(line) => match Event::default().json_data(&line) {
                Ok(event) => Some(Ok(event)),
                Err(err) => {
                    warn!(error = %err, "failed to encode log frame");
                    None
                }
            },
            // A lagged subscriber misses lines; delivery is best-effort.
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!(%scan_id, missed, "log subscriber lagged");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
