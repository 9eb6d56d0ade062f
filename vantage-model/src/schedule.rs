use chrono::{DateTime, Duration, Utc};

use crate::ids::{ProjectId, ScheduleId};

/// A recurring definition that spawns new scans on a fixed interval.
///
/// Once a run has occurred, `next_run_at >= last_run_at + interval` holds; a
/// disabled schedule is never selected by the ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    pub id: ScheduleId,
    pub project_id: Option<ProjectId>,
    pub target: String,
    pub tools: Vec<String>,
    pub interval_minutes: u32,
    pub enabled: bool,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(
        target: impl Into<String>,
        tools: Vec<String>,
        interval_minutes: u32,
        project_id: Option<ProjectId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ScheduleId::new(),
            project_id,
            target: target.into(),
            tools,
            interval_minutes,
            enabled: true,
            next_run_at: now,
            last_run_at: None,
            created_at: now,
        }
    }

    /// Effective interval; zero-configured schedules still advance by a
    /// minute so they cannot be selected twice within one tick period.
    pub fn effective_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_floor_is_one_minute() {
        let mut schedule = Schedule::new("example.com", vec![], 0, None);
        assert_eq!(schedule.effective_interval(), Duration::minutes(1));
        schedule.interval_minutes = 5;
        assert_eq!(schedule.effective_interval(), Duration::minutes(5));
    }
}
