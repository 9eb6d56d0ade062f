//! Postgres-backed persistence for scans, findings, schedules, and the
//! client/project records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::fmt;
use tracing::info;

use vantage_model::{
    Client, Finding, Project, Scan, ScanId, ScanStatus, Schedule, ScheduleId,
    Severity,
};

use crate::error::{EngineError, Result};
use crate::store::{
    ClientStore, FindingStore, ProjectStore, ScanStore, ScheduleStore,
    ScheduleUpdate,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresStore {
    /// Create the store and verify database health.
    pub async fn new(pool: PgPool) -> Result<Self> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| {
                EngineError::Internal(format!(
                    "store failed Postgres health check: {e}"
                ))
            })?;
        info!("record store connected to Postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_status(raw: &str) -> Result<ScanStatus> {
    raw.parse()
        .map_err(|e| EngineError::Internal(format!("stored scan row is corrupt: {e}")))
}

fn decode_severity(raw: &str) -> Result<Severity> {
    raw.parse()
        .map_err(|e| EngineError::Internal(format!("stored finding row is corrupt: {e}")))
}

fn scan_from_row(row: &PgRow) -> Result<Scan> {
    let status: String = row.try_get("status")?;
    Ok(Scan {
        id: row.try_get("id")?,
        target: row.try_get("target")?,
        tools: row.try_get("tools")?,
        status: decode_status(&status)?,
        created_at: row.try_get("created_at")?,
        finished_at: row.try_get("finished_at")?,
        project_id: row.try_get("project_id")?,
    })
}

fn finding_from_row(row: &PgRow) -> Result<Finding> {
    let severity: String = row.try_get("severity")?;
    Ok(Finding {
        id: row.try_get("id")?,
        scan_id: row.try_get("scan_id")?,
        tool: row.try_get("tool")?,
        category: row.try_get("category")?,
        value: row.try_get("value")?,
        severity: decode_severity(&severity)?,
        metadata: row.try_get("metadata")?,
        raw: row.try_get("raw")?,
    })
}

fn schedule_from_row(row: &PgRow) -> Result<Schedule> {
    let interval: i32 = row.try_get("interval_minutes")?;
    Ok(Schedule {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        target: row.try_get("target")?,
        tools: row.try_get("tools")?,
        interval_minutes: interval.max(1) as u32,
        enabled: row.try_get("enabled")?,
        next_run_at: row.try_get("next_run_at")?,
        last_run_at: row.try_get("last_run_at")?,
        created_at: row.try_get("created_at")?,
    })
}

const SCHEDULE_COLUMNS: &str = "id, project_id, target, tools, \
     interval_minutes, enabled, next_run_at, last_run_at, created_at";

#[async_trait]
impl ScanStore for PostgresStore {
    async fn create_scan(&self, scan: &Scan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scans (id, target, tools, status, created_at, finished_at, project_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(scan.id)
        .bind(&scan.target)
        .bind(&scan.tools)
        .bind(scan.status.as_str())
        .bind(scan.created_at)
        .bind(scan.finished_at)
        .bind(scan.project_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_scan(&self, id: ScanId) -> Result<Option<Scan>> {
        let row = sqlx::query(
            "SELECT id, target, tools, status, created_at, finished_at, project_id \
             FROM scans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(scan_from_row).transpose()
    }

    async fn list_scans(&self, limit: i64) -> Result<Vec<Scan>> {
        let rows = sqlx::query(
            "SELECT id, target, tools, status, created_at, finished_at, project_id \
             FROM scans ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(scan_from_row).collect()
    }

    async fn transition_scan(
        &self,
        id: ScanId,
        from: &[ScanStatus],
        to: ScanStatus,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let from: Vec<String> =
            from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE scans
            SET status = $2, finished_at = COALESCE($3, finished_at)
            WHERE id = $1 AND status = ANY($4)
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(finished_at)
        .bind(&from)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_scan(&self, id: ScanId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl FindingStore for PostgresStore {
    async fn append_findings(&self, findings: &[Finding]) -> Result<()> {
        if findings.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for finding in findings {
            sqlx::query(
                r#"
                INSERT INTO findings (id, scan_id, tool, category, value, severity, metadata, raw)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(finding.id)
            .bind(finding.scan_id)
            .bind(&finding.tool)
            .bind(&finding.category)
            .bind(&finding.value)
            .bind(finding.severity.as_str())
            .bind(&finding.metadata)
            .bind(&finding.raw)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn findings_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>> {
        let rows = sqlx::query(
            "SELECT id, scan_id, tool, category, value, severity, metadata, raw \
             FROM findings WHERE scan_id = $1 ORDER BY id",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(finding_from_row).collect()
    }
}

#[async_trait]
impl ScheduleStore for PostgresStore {
    async fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedules
              (id, project_id, target, tools, interval_minutes, enabled,
               next_run_at, last_run_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.project_id)
        .bind(&schedule.target)
        .bind(&schedule.tools)
        .bind(schedule.interval_minutes.min(i32::MAX as u32) as i32)
        .bind(schedule.enabled)
        .bind(schedule.next_run_at)
        .bind(schedule.last_run_at)
        .bind(schedule.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    async fn update_schedule(
        &self,
        id: ScheduleId,
        update: ScheduleUpdate,
    ) -> Result<Option<Schedule>> {
        let interval = update
            .interval_minutes
            .map(|m| m.min(i32::MAX as u32) as i32);
        let row = sqlx::query(&format!(
            r#"
            UPDATE schedules
            SET target = COALESCE($2, target),
                tools = COALESCE($3, tools),
                interval_minutes = COALESCE($4, interval_minutes),
                enabled = COALESCE($5, enabled)
            WHERE id = $1
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.target)
        .bind(update.tools)
        .bind(interval)
        .bind(update.enabled)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE schedules
            SET last_run_at = $1,
                next_run_at = $1 + make_interval(mins => GREATEST(interval_minutes, 1))
            WHERE enabled AND next_run_at <= $1
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(schedule_from_row).collect()
    }
}

#[async_trait]
impl ClientStore for PostgresStore {
    async fn create_client(&self, client: &Client) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO clients (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(client.id)
        .bind(&client.name)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::Conflict(format!(
                "client name already exists: {}",
                client.name
            )));
        }
        Ok(())
    }

    async fn list_clients(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query("SELECT id, name FROM clients ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Client {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProjectStore for PostgresStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (id, name, client_id) VALUES ($1, $2, $3)",
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(project.client_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows =
            sqlx::query("SELECT id, name, client_id FROM projects ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|row| {
                Ok(Project {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    client_id: row.try_get("client_id")?,
                })
            })
            .collect()
    }
}
