//! Runs one scan: walks its tool list in order, invokes each plugin,
//! persists findings tool-by-tool, forwards output to the log broker, and
//! drives the scan's state machine.
//!
//! Lifecycle: `pending -> queued -> running -> {completed | stopped | error}`.
//! The cooperative stop marker is polled before each tool; a fault inside a
//! tool is contained by the plugin contract, while a fault in orchestration
//! itself moves the scan to `error` and never escapes to the dispatcher.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use vantage_model::{Finding, Scan, ScanId, ScanStatus, Severity};

use crate::broker::LogBroker;
use crate::cancel::CancellationCoordinator;
use crate::error::Result;
use crate::store::Stores;
use crate::tools::{ToolContext, ToolPlugin, ToolRegistry};

#[derive(Debug, Clone)]
pub struct ScanExecutor {
    stores: Stores,
    registry: Arc<ToolRegistry>,
    broker: LogBroker,
    cancel: CancellationCoordinator,
}

impl ScanExecutor {
    pub fn new(
        stores: Stores,
        registry: Arc<ToolRegistry>,
        broker: LogBroker,
        cancel: CancellationCoordinator,
    ) -> Self {
        Self {
            stores,
            registry,
            broker,
            cancel,
        }
    }

    /// Execute a scan to a terminal state. Never fails from the caller's
    /// point of view; orchestration faults are absorbed into the `error`
    /// status. Always clears cancellation bookkeeping and closes the scan's
    /// log channel on exit, so a later stop request is a no-op.
    pub async fn execute(&self, scan: Scan, abort_handle: Option<AbortHandle>) {
        let scan_id = scan.id;
        let mut abort_token = None;

        if let Err(err) = self.run(&scan, abort_handle, &mut abort_token).await {
            error!(%scan_id, error = %err, "scan orchestration fault");
            self.broker.publish(scan_id, None, format!("ERROR: {err}"));
            let faulted = self
                .stores
                .scans
                .transition_scan(
                    scan_id,
                    &[ScanStatus::Pending, ScanStatus::Queued, ScanStatus::Running],
                    ScanStatus::Error,
                    None,
                )
                .await;
            if let Err(err) = faulted {
                error!(%scan_id, error = %err, "failed to record scan error status");
            }
        }

        self.cancel.clear(scan_id, abort_token);
        self.broker.close(scan_id);
    }

    async fn run(
        &self,
        scan: &Scan,
        abort_handle: Option<AbortHandle>,
        abort_token: &mut Option<Uuid>,
    ) -> Result<()> {
        let scan_id = scan.id;

        // A stop that arrived before the worker picked the scan up halts it
        // at this very first checkpoint, without invoking any tool.
        if self.cancel.is_stop_requested(scan_id) {
            self.finish_stopped(scan_id, 0).await?;
            return Ok(());
        }

        // Handle goes on record before the row says `running`: anyone who
        // observes the running state can rely on forceful termination being
        // available. A failed claim is undone by the epilogue's clear.
        if let Some(handle) = abort_handle {
            *abort_token = Some(self.cancel.register_abort(scan_id, handle));
        }
        let claimed = self
            .stores
            .scans
            .transition_scan(
                scan_id,
                &[ScanStatus::Pending, ScanStatus::Queued],
                ScanStatus::Running,
                None,
            )
            .await?;
        if !claimed {
            debug!(%scan_id, "scan no longer claimable, skipping execution");
            return Ok(());
        }
        info!(%scan_id, target = %scan.target, tools = scan.tools.len(), "scan running");

        let mut total = 0usize;
        for tool_id in &scan.tools {
            if self.cancel.is_stop_requested(scan_id) {
                self.finish_stopped(scan_id, total).await?;
                return Ok(());
            }

            let Some(plugin) = self.registry.get(tool_id) else {
                debug!(%scan_id, tool = %tool_id, "unknown tool identifier, skipping");
                continue;
            };

            self.broker.publish(
                scan_id,
                None,
                format!("== running {} ==", plugin.descriptor().name),
            );

            let ctx = ToolContext {
                scan_id,
                cancellation: self.cancel.cancellation(scan_id),
                logs: self.broker.clone(),
            };
            let drafts = plugin.run(&scan.target, &ctx).await;

            for draft in &drafts {
                if draft.severity == Severity::Error {
                    self.broker.publish(
                        scan_id,
                        Some(tool_id),
                        format!("ERROR: {}", draft.value),
                    );
                }
            }

            let findings: Vec<Finding> = drafts
                .into_iter()
                .map(|draft| draft.into_finding(scan_id, tool_id))
                .collect();
            self.stores.findings.append_findings(&findings).await?;
            total += findings.len();
        }

        // A stop during the final tool still counts: only an exhaustion
        // without any stop request completes the scan.
        if self.cancel.is_stop_requested(scan_id) {
            self.finish_stopped(scan_id, total).await?;
            return Ok(());
        }

        self.stores
            .scans
            .transition_scan(
                scan_id,
                &[ScanStatus::Running],
                ScanStatus::Completed,
                Some(Utc::now()),
            )
            .await?;
        self.broker.publish(
            scan_id,
            None,
            format!("== scan finished, {total} findings =="),
        );
        info!(%scan_id, findings = total, "scan completed");
        Ok(())
    }

    async fn finish_stopped(&self, scan_id: ScanId, findings: usize) -> Result<()> {
        self.stores
            .scans
            .transition_scan(
                scan_id,
                &[ScanStatus::Pending, ScanStatus::Queued, ScanStatus::Running],
                ScanStatus::Stopped,
                Some(Utc::now()),
            )
            .await?;
        self.broker.publish(
            scan_id,
            None,
            format!("== scan stopped, {findings} findings =="),
        );
        info!(%scan_id, findings, "scan stopped");
        Ok(())
    }
}
