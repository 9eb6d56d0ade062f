//! In-memory store used by the test suite and ephemeral runs. Mirrors the
//! semantics of the Postgres implementation, including atomic schedule
//! claiming and append-only findings.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vantage_model::{
    Client, Finding, Project, Scan, ScanId, ScanStatus, Schedule, ScheduleId,
};

use crate::error::{EngineError, Result};
use crate::store::{
    ClientStore, FindingStore, ProjectStore, ScanStore, ScheduleStore,
    ScheduleUpdate,
};

#[derive(Debug, Default)]
struct State {
    scans: HashMap<ScanId, Scan>,
    findings: Vec<Finding>,
    schedules: HashMap<ScheduleId, Schedule>,
    clients: Vec<Client>,
    projects: Vec<Project>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("in-memory store mutex poisoned")
    }
}

#[async_trait]
impl ScanStore for InMemoryStore {
    async fn create_scan(&self, scan: &Scan) -> Result<()> {
        self.lock().scans.insert(scan.id, scan.clone());
        Ok(())
    }

    async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>> {
        Ok(self.lock().scans.get(&id).cloned())
    }

    async fn list_scans(&self, limit: i64) -> Result<Vec<Scan>> {
        let mut scans: Vec<Scan> = self.lock().scans.values().cloned().collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        scans.truncate(limit.max(0) as usize);
        Ok(scans)
    }

    async fn transition_scan(
        &self,
        id: ScanId,
        from: &[ScanStatus],
        to: ScanStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mut state = self.lock();
        match state.scans.get_mut(&id) {
            Some(scan) if from.contains(&scan.status) => {
                scan.status = to;
                if finished_at.is_some() {
                    scan.finished_at = finished_at;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_scan(&self, id: ScanId) -> Result<bool> {
        let mut state = self.lock();
        let removed = state.scans.remove(&id).is_some();
        if removed {
            state.findings.retain(|finding| finding.scan_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl FindingStore for InMemoryStore {
    async fn append_findings(&self, findings: &[Finding]) -> Result<()> {
        self.lock().findings.extend_from_slice(findings);
        Ok(())
    }

    async fn findings_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>> {
        Ok(self
            .lock()
            .findings
            .iter()
            .filter(|finding| finding.scan_id == scan_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScheduleStore for InMemoryStore {
    async fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.lock().schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        Ok(self.lock().schedules.get(&id).cloned())
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let mut schedules: Vec<Schedule> =
            self.lock().schedules.values().cloned().collect();
        schedules.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(schedules)
    }

    async fn update_schedule(
        &self,
        id: ScheduleId,
        update: ScheduleUpdate,
    ) -> Result<Option<Schedule>> {
        let mut state = self.lock();
        let Some(schedule) = state.schedules.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(target) = update.target {
            schedule.target = target;
        }
        if let Some(tools) = update.tools {
            schedule.tools = tools;
        }
        if let Some(interval) = update.interval_minutes {
            schedule.interval_minutes = interval;
        }
        if let Some(enabled) = update.enabled {
            schedule.enabled = enabled;
        }
        Ok(Some(schedule.clone()))
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<bool> {
        Ok(self.lock().schedules.remove(&id).is_some())
    }

    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let mut state = self.lock();
        let mut claimed = Vec::new();
        for schedule in state.schedules.values_mut() {
            if schedule.enabled && schedule.next_run_at <= now {
                schedule.last_run_at = Some(now);
                schedule.next_run_at = now + schedule.effective_interval();
                claimed.push(schedule.clone());
            }
        }
        Ok(claimed)
    }
}

#[async_trait]
impl ClientStore for InMemoryStore {
    async fn create_client(&self, client: &Client) -> Result<()> {
        let mut state = self.lock();
        if state.clients.iter().any(|c| c.name == client.name) {
            return Err(EngineError::Conflict(format!(
                "client name already exists: {}",
                client.name
            )));
        }
        state.clients.push(client.clone());
        Ok(())
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        let mut clients = self.lock().clients.clone();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        self.lock().projects.push(project.clone());
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects = self.lock().projects.clone();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use vantage_model::{FindingDraft, Severity};

    use super::*;

    #[tokio::test]
    async fn transition_requires_allowed_source_state() {
        let store = InMemoryStore::new();
        let scan = Scan::new("example.com", vec!["subfinder".into()], None);
        store.create_scan(&scan).await.unwrap();

        assert!(
            store
                .transition_scan(
                    scan.id,
                    &[ScanStatus::Pending],
                    ScanStatus::Queued,
                    None
                )
                .await
                .unwrap()
        );
        // Already queued; a second claim must lose.
        assert!(
            !store
                .transition_scan(
                    scan.id,
                    &[ScanStatus::Pending],
                    ScanStatus::Queued,
                    None
                )
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn findings_are_append_only() {
        let store = InMemoryStore::new();
        let scan_id = ScanId::new();
        let batch: Vec<_> = (0..2)
            .map(|i| {
                FindingDraft::new("subdomain", format!("s{i}.example.com"), Severity::Info)
                    .into_finding(scan_id, "subfinder")
            })
            .collect();

        store.append_findings(&batch).await.unwrap();
        store.append_findings(&batch).await.unwrap();

        // No merging, no deduplication.
        assert_eq!(store.findings_for_scan(scan_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn claim_due_skips_disabled_and_future_schedules() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let due = Schedule::new("example.com", vec![], 5, None);
        let mut disabled = Schedule::new("disabled.example.com", vec![], 5, None);
        disabled.enabled = false;
        let mut future = Schedule::new("future.example.com", vec![], 5, None);
        future.next_run_at = now + chrono::Duration::minutes(30);

        for schedule in [&due, &disabled, &future] {
            store.create_schedule(schedule).await.unwrap();
        }

        let claimed = store.claim_due(now).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, due.id);
        assert_eq!(claimed[0].last_run_at, Some(now));
        assert_eq!(claimed[0].next_run_at, now + chrono::Duration::minutes(5));
    }
}
