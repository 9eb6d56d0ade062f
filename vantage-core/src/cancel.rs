//! Dual-mode cancellation for in-flight scans.
//!
//! Two independent signals per scan: a cooperative stop marker polled by the
//! executor and streaming plugins at their checkpoints, and an optional
//! forceful abort handle recorded as the scan enters execution. Setting the
//! marker never interrupts a blocking call already in flight; the abort
//! handle is best-effort and may be absent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

use vantage_model::ScanId;

/// Markers left by stop requests that no executor ever consumes (e.g. the
/// scan row was deleted first) are dropped after this long.
const DEFAULT_MARKER_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct StopMarker {
    flag: AtomicBool,
    requested_at: Instant,
}

#[derive(Debug)]
struct RegisteredAbort {
    token: Uuid,
    handle: AbortHandle,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// Whether this request set the marker (false when already requested).
    pub marker_set: bool,
    /// Whether a recorded abort handle was fired.
    pub aborted: bool,
}

#[derive(Debug)]
struct Inner {
    markers: DashMap<ScanId, StopMarker>,
    handles: DashMap<ScanId, RegisteredAbort>,
    marker_ttl: Duration,
}

/// Shared coordinator for cooperative markers and forceful abort handles.
#[derive(Debug, Clone)]
pub struct CancellationCoordinator {
    inner: Arc<Inner>,
}

impl Default for CancellationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Self::with_marker_ttl(DEFAULT_MARKER_TTL)
    }

    pub fn with_marker_ttl(marker_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                markers: DashMap::new(),
                handles: DashMap::new(),
                marker_ttl,
            }),
        }
    }

    /// Request a stop: set the cooperative marker, then fire the abort
    /// handle if one is on record. Idempotent.
    pub fn request_stop(&self, scan_id: ScanId) -> StopOutcome {
        self.purge_expired();

        let mut marker_set = false;
        let marker = self
            .inner
            .markers
            .entry(scan_id)
            .or_insert_with(|| {
                marker_set = true;
                StopMarker {
                    flag: AtomicBool::new(false),
                    requested_at: Instant::now(),
                }
            });
        marker.flag.store(true, Ordering::SeqCst);
        drop(marker);

        let aborted = match self.inner.handles.remove(&scan_id) {
            Some((_, registered)) => {
                debug!(%scan_id, "aborting scan task");
                registered.handle.abort();
                true
            }
            None => false,
        };

        StopOutcome { marker_set, aborted }
    }

    /// Whether a live (unexpired) stop marker exists for the scan.
    pub fn is_stop_requested(&self, scan_id: ScanId) -> bool {
        let observed = self.inner.markers.get(&scan_id).map(|marker| {
            (
                marker.flag.load(Ordering::SeqCst),
                marker.requested_at.elapsed(),
            )
        });
        match observed {
            Some((flag, age)) if age <= self.inner.marker_ttl => flag,
            Some(_) => {
                self.inner.markers.remove(&scan_id);
                false
            }
            None => false,
        }
    }

    /// Record the abort handle for a scan's worker task. Returns a token the
    /// owner must present to [`clear`](Self::clear) so a stale registration
    /// cannot remove a newer one.
    pub fn register_abort(&self, scan_id: ScanId, handle: AbortHandle) -> Uuid {
        let token = Uuid::now_v7();
        self.inner
            .handles
            .insert(scan_id, RegisteredAbort { token, handle });
        token
    }

    /// Drop all bookkeeping for a finished scan. The abort handle is removed
    /// only when the token matches the latest registration.
    pub fn clear(&self, scan_id: ScanId, token: Option<Uuid>) {
        if let Some(token) = token {
            self.inner
                .handles
                .remove_if(&scan_id, |_, registered| registered.token == token);
        }
        self.inner.markers.remove(&scan_id);
    }

    /// Cheap per-scan view handed into tool plugins.
    pub fn cancellation(&self, scan_id: ScanId) -> ScanCancellation {
        ScanCancellation {
            coordinator: self.clone(),
            scan_id,
        }
    }

    fn purge_expired(&self) {
        let ttl = self.inner.marker_ttl;
        self.inner
            .markers
            .retain(|_, marker| marker.requested_at.elapsed() <= ttl);
    }
}

/// Cooperative stop signal scoped to one scan.
#[derive(Debug, Clone)]
pub struct ScanCancellation {
    coordinator: CancellationCoordinator,
    scan_id: ScanId,
}

impl ScanCancellation {
    pub fn is_stop_requested(&self) -> bool {
        self.coordinator.is_stop_requested(self.scan_id)
    }

    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_requests_are_idempotent() {
        let coordinator = CancellationCoordinator::new();
        let scan_id = ScanId::new();

        let first = coordinator.request_stop(scan_id);
        assert!(first.marker_set);
        assert!(!first.aborted);
        assert!(coordinator.is_stop_requested(scan_id));

        let second = coordinator.request_stop(scan_id);
        assert!(!second.marker_set);
        assert!(coordinator.is_stop_requested(scan_id));
    }

    #[test]
    fn clear_removes_marker() {
        let coordinator = CancellationCoordinator::new();
        let scan_id = ScanId::new();

        coordinator.request_stop(scan_id);
        coordinator.clear(scan_id, None);
        assert!(!coordinator.is_stop_requested(scan_id));
    }

    #[test]
    fn markers_expire() {
        let coordinator =
            CancellationCoordinator::with_marker_ttl(Duration::from_millis(0));
        let scan_id = ScanId::new();

        coordinator.request_stop(scan_id);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!coordinator.is_stop_requested(scan_id));
    }

    #[tokio::test]
    async fn stop_fires_registered_abort_handle() {
        let coordinator = CancellationCoordinator::new();
        let scan_id = ScanId::new();

        let task = tokio::spawn(std::future::pending::<()>());
        coordinator.register_abort(scan_id, task.abort_handle());

        let outcome = coordinator.request_stop(scan_id);
        assert!(outcome.aborted);
        assert!(task.await.unwrap_err().is_cancelled());

        // Handle consumed; a second stop has nothing left to abort.
        let outcome = coordinator.request_stop(scan_id);
        assert!(!outcome.aborted);
    }

    #[tokio::test]
    async fn clear_with_stale_token_keeps_newer_handle() {
        let coordinator = CancellationCoordinator::new();
        let scan_id = ScanId::new();

        let first = tokio::spawn(std::future::pending::<()>());
        let stale = coordinator.register_abort(scan_id, first.abort_handle());

        let second = tokio::spawn(std::future::pending::<()>());
        coordinator.register_abort(scan_id, second.abort_handle());

        coordinator.clear(scan_id, Some(stale));
        let outcome = coordinator.request_stop(scan_id);
        assert!(outcome.aborted);

        first.abort();
        second.abort();
    }

    #[test]
    fn cancellation_view_tracks_coordinator() {
        let coordinator = CancellationCoordinator::new();
        let scan_id = ScanId::new();
        let cancellation = coordinator.cancellation(scan_id);

        assert!(!cancellation.is_stop_requested());
        coordinator.request_stop(scan_id);
        assert!(cancellation.is_stop_requested());
    }
}
