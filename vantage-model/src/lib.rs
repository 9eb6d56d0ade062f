//! Core data model definitions shared across Vantage crates.
#![allow(missing_docs)]

pub mod error;
pub mod finding;
pub mod ids;
pub mod org;
pub mod scan;
pub mod schedule;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use finding::{Finding, FindingDraft, MAX_RAW_PAYLOAD_BYTES, Severity};
pub use ids::{ClientId, FindingId, ProjectId, ScanId, ScheduleId};
pub use org::{Client, Project};
pub use scan::{Scan, ScanStatus};
pub use schedule::Schedule;
