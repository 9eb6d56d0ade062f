//! Accepts scan-creation requests, persists the initial row, and hands
//! scans to a semaphore-bounded worker pool for asynchronous execution.
//! Also the start/stop control surface.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Semaphore, oneshot};
use tracing::{info, warn};

use vantage_model::{ProjectId, Scan, ScanId, ScanStatus, Schedule};

use crate::broker::LogBroker;
use crate::cancel::CancellationCoordinator;
use crate::error::{EngineError, Result};
use crate::executor::ScanExecutor;
use crate::store::Stores;
use crate::tools::ToolRegistry;

/// Scan-creation boundary payload.
#[derive(Debug, Clone)]
pub struct CreateScanRequest {
    pub target: String,
    pub tools: Vec<String>,
    pub project_id: Option<ProjectId>,
}

/// Seam used by the schedule ticker so it can be tested against a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScanLauncher: Send + Sync {
    /// Create and immediately launch a scan from a schedule definition.
    async fn launch_scheduled(&self, schedule: &Schedule) -> Result<Scan>;
}

struct DispatcherInner {
    stores: Stores,
    registry: Arc<ToolRegistry>,
    broker: LogBroker,
    cancel: CancellationCoordinator,
    permits: Arc<Semaphore>,
}

/// Entry point for creating, starting, and stopping scans.
#[derive(Clone)]
pub struct ScanDispatcher {
    inner: Arc<DispatcherInner>,
}

impl fmt::Debug for ScanDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanDispatcher")
            .field("registry", &self.inner.registry)
            .field("available_permits", &self.inner.permits.available_permits())
            .finish()
    }
}

impl ScanDispatcher {
    pub fn new(
        stores: Stores,
        registry: Arc<ToolRegistry>,
        broker: LogBroker,
        cancel: CancellationCoordinator,
        scan_permits: usize,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                stores,
                registry,
                broker,
                cancel,
                permits: Arc::new(Semaphore::new(scan_permits.max(1))),
            }),
        }
    }

    pub fn broker(&self) -> &LogBroker {
        &self.inner.broker
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.inner.registry
    }

    /// Persist a new scan and hand it to the worker pool. Returns the scan
    /// as accepted (status `queued`).
    pub async fn create_scan(&self, request: CreateScanRequest) -> Result<Scan> {
        let scan = Scan::new(request.target, request.tools, request.project_id);
        self.inner.stores.scans.create_scan(&scan).await?;
        self.launch(scan).await
    }

    /// Re-dispatch an existing scan. Conflicts when the scan is already
    /// queued or running; a terminal scan can never re-enter the queue.
    pub async fn start(&self, scan_id: ScanId) -> Result<Scan> {
        let scan = self
            .inner
            .stores
            .scans
            .get_scan(scan_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("scan {scan_id}")))?;

        if scan.status.is_active() {
            return Err(EngineError::Conflict(format!(
                "scan {scan_id} is already {}",
                scan.status
            )));
        }
        if scan.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "scan {scan_id} already finished as {}",
                scan.status
            )));
        }
        self.launch(scan).await
    }

    /// Request a stop. Idempotent and always succeeds at this boundary: the
    /// cooperative marker is set first, then the worker task is aborted if a
    /// handle is on record. Against a terminal scan this is a no-op.
    pub async fn stop(&self, scan_id: ScanId) -> Result<()> {
        let scan = self
            .inner
            .stores
            .scans
            .get_scan(scan_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("scan {scan_id}")))?;

        if scan.status.is_terminal() {
            return Ok(());
        }

        let outcome = self.inner.cancel.request_stop(scan_id);
        info!(%scan_id, aborted = outcome.aborted, "stop requested");

        if outcome.aborted {
            // The worker died without running its cleanup path; finalize the
            // row and channel here. The conditional transition keeps this
            // idempotent against a worker that finished concurrently.
            let stopped = self
                .inner
                .stores
                .scans
                .transition_scan(
                    scan_id,
                    &[ScanStatus::Pending, ScanStatus::Queued, ScanStatus::Running],
                    ScanStatus::Stopped,
                    Some(Utc::now()),
                )
                .await?;
            if stopped {
                self.inner
                    .broker
                    .publish(scan_id, None, "== scan stopped ==");
            }
            self.inner.cancel.clear(scan_id, None);
            self.inner.broker.close(scan_id);
        }
        Ok(())
    }

    fn executor(&self) -> ScanExecutor {
        ScanExecutor::new(
            self.inner.stores.clone(),
            self.inner.registry.clone(),
            self.inner.broker.clone(),
            self.inner.cancel.clone(),
        )
    }

    async fn launch(&self, mut scan: Scan) -> Result<Scan> {
        let claimed = self
            .inner
            .stores
            .scans
            .transition_scan(
                scan.id,
                &[ScanStatus::Pending],
                ScanStatus::Queued,
                None,
            )
            .await?;
        if !claimed {
            return Err(EngineError::Conflict(format!(
                "scan {} is already queued or running",
                scan.id
            )));
        }
        scan.status = ScanStatus::Queued;

        let executor = self.executor();
        let permits = self.inner.permits.clone();
        let worker_scan = scan.clone();
        // The abort handle only exists once the task does; hand it in
        // through a oneshot so the executor can record it when the scan
        // reaches `running`.
        let (handle_tx, handle_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let abort_handle = handle_rx.await.ok();
            executor.execute(worker_scan, abort_handle).await;
        });
        if handle_tx.send(join.abort_handle()).is_err() {
            warn!(scan_id = %scan.id, "worker exited before receiving its abort handle");
        }

        Ok(scan)
    }
}

#[async_trait]
impl ScanLauncher for ScanDispatcher {
    async fn launch_scheduled(&self, schedule: &Schedule) -> Result<Scan> {
        self.create_scan(CreateScanRequest {
            target: schedule.target.clone(),
            tools: schedule.tools.clone(),
            project_id: schedule.project_id,
        })
        .await
    }
}
