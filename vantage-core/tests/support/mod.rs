//! Shared fixtures for the orchestration integration tests: scripted tool
//! plugins, a transition-recording scan store, and a small harness wiring
//! the engine against in-memory persistence.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use vantage_core::broker::LogBroker;
use vantage_core::cancel::CancellationCoordinator;
use vantage_core::dispatcher::ScanDispatcher;
use vantage_core::error::{EngineError, Result};
use vantage_core::executor::ScanExecutor;
use vantage_core::store::memory::InMemoryStore;
use vantage_core::store::{FindingStore, ScanStore, Stores};
use vantage_core::tools::{
    TargetKind, ToolContext, ToolDescriptor, ToolPlugin, ToolRegistry,
};
use vantage_model::{
    Finding, FindingDraft, Scan, ScanId, ScanStatus, Severity,
};

const ALL_KINDS: &[TargetKind] =
    &[TargetKind::Domain, TargetKind::Ip, TargetKind::Email];

/// What a scripted plugin does when invoked.
pub enum Behavior {
    /// Publish one line per draft, then return them all.
    Yield(Vec<FindingDraft>),
    /// Publish and collect `first`, then wait for the gate; if a stop was
    /// requested in the meantime return only `first`, otherwise continue
    /// with `rest`.
    GateThenCheck {
        first: Vec<FindingDraft>,
        rest: Vec<FindingDraft>,
        gate: Arc<Notify>,
    },
    /// Batch-style work that exceeds its own deadline and converts the
    /// elapsed timeout into a single error finding.
    SleepBeyond { limit: Duration, work: Duration },
    /// Block far beyond any test timeout; only forceful abort ends it.
    BlockUntilAborted,
}

pub struct ScriptedPlugin {
    descriptor: ToolDescriptor,
    behavior: Behavior,
    runs: AtomicUsize,
}

impl ScriptedPlugin {
    pub fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            descriptor: ToolDescriptor {
                id,
                name: id,
                supported_targets: ALL_KINDS,
            },
            behavior,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn yielding(id: &'static str, count: usize) -> Arc<Self> {
        let drafts = (0..count)
            .map(|i| {
                FindingDraft::new(
                    "subdomain",
                    format!("{id}-{i}.example.com"),
                    Severity::Info,
                )
            })
            .collect();
        Self::new(id, Behavior::Yield(drafts))
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolPlugin for ScriptedPlugin {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn run(&self, _target: &str, ctx: &ToolContext) -> Vec<FindingDraft> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Yield(drafts) => {
                for draft in drafts {
                    ctx.logs.publish(
                        ctx.scan_id,
                        Some(self.descriptor.id),
                        draft.value.clone(),
                    );
                }
                drafts.clone()
            }
            Behavior::GateThenCheck { first, rest, gate } => {
                let mut produced = first.clone();
                for draft in &produced {
                    ctx.logs.publish(
                        ctx.scan_id,
                        Some(self.descriptor.id),
                        draft.value.clone(),
                    );
                }
                gate.notified().await;
                if ctx.cancellation.is_stop_requested() {
                    return produced;
                }
                for draft in rest {
                    ctx.logs.publish(
                        ctx.scan_id,
                        Some(self.descriptor.id),
                        draft.value.clone(),
                    );
                }
                produced.extend(rest.iter().cloned());
                produced
            }
            Behavior::SleepBeyond { limit, work } => {
                match tokio::time::timeout(*limit, tokio::time::sleep(*work)).await {
                    Ok(()) => Vec::new(),
                    Err(_) => vec![FindingDraft::tool_error("request timed out")],
                }
            }
            Behavior::BlockUntilAborted => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Vec::new()
            }
        }
    }
}

/// Scan store decorator that records every successful transition.
pub struct RecordingScanStore {
    inner: Arc<InMemoryStore>,
    transitions: std::sync::Mutex<Vec<(ScanId, ScanStatus)>>,
}

impl RecordingScanStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            transitions: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn path_for(&self, scan_id: ScanId) -> Vec<ScanStatus> {
        self.transitions
            .lock()
            .expect("transition log mutex poisoned")
            .iter()
            .filter(|(id, _)| *id == scan_id)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl ScanStore for RecordingScanStore {
    async fn create_scan(&self, scan: &Scan) -> Result<()> {
        self.inner.create_scan(scan).await
    }

    async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>> {
        self.inner.get_scan(id).await
    }

    async fn list_scans(&self, limit: i64) -> Result<Vec<Scan>> {
        self.inner.list_scans(limit).await
    }

    async fn transition_scan(
        &self,
        id: ScanId,
        from: &[ScanStatus],
        to: ScanStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let moved = self.inner.transition_scan(id, from, to, finished_at).await?;
        if moved {
            self.transitions
                .lock()
                .expect("transition log mutex poisoned")
                .push((id, to));
        }
        Ok(moved)
    }

    async fn delete_scan(&self, id: ScanId) -> Result<bool> {
        self.inner.delete_scan(id).await
    }
}

/// Finding store that fails on append, to exercise orchestration faults.
pub struct FailingFindingStore;

#[async_trait]
impl FindingStore for FailingFindingStore {
    async fn append_findings(&self, _findings: &[Finding]) -> Result<()> {
        Err(EngineError::Internal("findings table unavailable".into()))
    }

    async fn findings_for_scan(&self, _scan_id: ScanId) -> Result<Vec<Finding>> {
        Ok(Vec::new())
    }
}

/// Engine wired against in-memory persistence with scripted plugins.
pub struct TestContext {
    pub memory: Arc<InMemoryStore>,
    pub recorder: Arc<RecordingScanStore>,
    pub stores: Stores,
    pub broker: LogBroker,
    pub cancel: CancellationCoordinator,
    pub registry: Arc<ToolRegistry>,
}

impl TestContext {
    pub fn new(plugins: Vec<Arc<dyn ToolPlugin>>) -> Self {
        let memory = Arc::new(InMemoryStore::new());
        let recorder = RecordingScanStore::new(memory.clone());
        let stores = Stores {
            scans: recorder.clone(),
            findings: memory.clone(),
            schedules: memory.clone(),
            clients: memory.clone(),
            projects: memory.clone(),
        };
        Self {
            memory,
            recorder,
            stores,
            broker: LogBroker::new(),
            cancel: CancellationCoordinator::new(),
            registry: Arc::new(ToolRegistry::from_plugins(plugins)),
        }
    }

    pub fn executor(&self) -> ScanExecutor {
        ScanExecutor::new(
            self.stores.clone(),
            self.registry.clone(),
            self.broker.clone(),
            self.cancel.clone(),
        )
    }

    pub fn dispatcher(&self, permits: usize) -> ScanDispatcher {
        ScanDispatcher::new(
            self.stores.clone(),
            self.registry.clone(),
            self.broker.clone(),
            self.cancel.clone(),
            permits,
        )
    }

    /// Seed a pending scan row.
    pub async fn seed_scan(&self, tools: &[&str]) -> Scan {
        let scan = Scan::new(
            "example.com",
            tools.iter().map(|t| t.to_string()).collect(),
            None,
        );
        self.stores
            .scans
            .create_scan(&scan)
            .await
            .expect("seed scan");
        scan
    }

    pub async fn wait_for_status(
        &self,
        scan_id: ScanId,
        expected: ScanStatus,
    ) -> Scan {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let scan = self
                .stores
                .scans
                .get_scan(scan_id)
                .await
                .expect("get scan")
                .expect("scan exists");
            if scan.status == expected {
                return scan;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "scan {scan_id} never reached {expected}, stuck at {}",
                scan.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
