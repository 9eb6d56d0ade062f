//! Persistence ports for the orchestration engine.
//!
//! The engine only ever talks to these traits. [`postgres::PostgresStore`]
//! is the production implementation; [`memory::InMemoryStore`] backs tests
//! and ephemeral runs.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vantage_model::{
    Client, Finding, Project, Scan, ScanId, ScanStatus, Schedule, ScheduleId,
};

use crate::error::Result;

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn create_scan(&self, scan: &Scan) -> Result<()>;
    async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>>;
    /// Most recent scans first.
    async fn list_scans(&self, limit: i64) -> Result<Vec<Scan>>;
    /// Conditionally move a scan from one of `from` into `to`, stamping
    /// `finished_at` when given. Returns false when the scan is missing or
    /// no longer in an allowed state. This is the serialization point that
    /// keeps two concurrent start requests from both claiming a scan.
    async fn transition_scan(
        &self,
        id: ScanId,
        from: &[ScanStatus],
        to: ScanStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;
    /// Cascades to the scan's findings.
    async fn delete_scan(&self, id: ScanId) -> Result<bool>;
}

#[async_trait]
pub trait FindingStore: Send + Sync {
    /// Append-only batch insert. The store never merges or deduplicates.
    async fn append_findings(&self, findings: &[Finding]) -> Result<()>;
    async fn findings_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>>;
}

/// Partial update for a stored schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub target: Option<String>,
    pub tools: Option<Vec<String>>,
    pub interval_minutes: Option<u32>,
    pub enabled: Option<bool>,
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create_schedule(&self, schedule: &Schedule) -> Result<()>;
    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>>;
    async fn list_schedules(&self) -> Result<Vec<Schedule>>;
    async fn update_schedule(
        &self,
        id: ScheduleId,
        update: ScheduleUpdate,
    ) -> Result<Option<Schedule>>;
    async fn delete_schedule(&self, id: ScheduleId) -> Result<bool>;
    /// Atomically advance every enabled schedule due at `now`
    /// (`last_run_at = now`, `next_run_at = now + interval`) and return the
    /// advanced rows. A second call at the same instant selects nothing.
    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn create_client(&self, client: &Client) -> Result<()>;
    async fn list_clients(&self) -> Result<Vec<Client>>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, project: &Project) -> Result<()>;
    async fn list_projects(&self) -> Result<Vec<Project>>;
}

/// Bundle of persistence ports handed to the engine components.
#[derive(Clone)]
pub struct Stores {
    pub scans: Arc<dyn ScanStore>,
    pub findings: Arc<dyn FindingStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub clients: Arc<dyn ClientStore>,
    pub projects: Arc<dyn ProjectStore>,
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores")
            .field("scans", &"dyn ScanStore")
            .field("findings", &"dyn FindingStore")
            .field("schedules", &"dyn ScheduleStore")
            .field("clients", &"dyn ClientStore")
            .field("projects", &"dyn ProjectStore")
            .finish()
    }
}

impl Stores {
    pub fn from_postgres(store: postgres::PostgresStore) -> Self {
        let store = Arc::new(store);
        Self {
            scans: store.clone(),
            findings: store.clone(),
            schedules: store.clone(),
            clients: store.clone(),
            projects: store,
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(memory::InMemoryStore::new());
        Self {
            scans: store.clone(),
            findings: store.clone(),
            schedules: store.clone(),
            clients: store.clone(),
            projects: store,
        }
    }
}
