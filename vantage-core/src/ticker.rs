//! Periodic schedule ticker: turns recurring definitions into new scans.
//!
//! Each tick atomically advances every enabled due schedule and asks the
//! dispatcher to create and launch a scan per definition. One schedule's
//! launch failure never blocks the rest of the tick, and schedules are
//! never auto-disabled by failures.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dispatcher::ScanLauncher;
use crate::error::Result;
use crate::store::ScheduleStore;

#[derive(Clone)]
pub struct ScheduleTicker {
    schedules: Arc<dyn ScheduleStore>,
    launcher: Arc<dyn ScanLauncher>,
    period: Duration,
}

impl std::fmt::Debug for ScheduleTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleTicker")
            .field("period", &self.period)
            .finish()
    }
}

impl ScheduleTicker {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        launcher: Arc<dyn ScanLauncher>,
        period: Duration,
    ) -> Self {
        Self {
            schedules,
            launcher,
            period,
        }
    }

    /// Process one tick boundary. Returns how many scans were launched.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.schedules.claim_due(now).await?;
        if due.is_empty() {
            debug!("no schedules due");
            return Ok(0);
        }

        let mut launched = 0usize;
        for schedule in &due {
            match self.launcher.launch_scheduled(schedule).await {
                Ok(scan) => {
                    info!(
                        schedule_id = %schedule.id,
                        scan_id = %scan.id,
                        target = %schedule.target,
                        "launched scheduled scan"
                    );
                    launched += 1;
                }
                Err(err) => {
                    warn!(
                        schedule_id = %schedule.id,
                        error = %err,
                        "failed to launch scheduled scan"
                    );
                }
            }
        }
        Ok(launched)
    }

    /// Run forever on the configured wall-clock period.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(err) = self.run_once(Utc::now()).await {
                    warn!(error = %err, "schedule tick failed");
                }
            }
        })
    }
}
