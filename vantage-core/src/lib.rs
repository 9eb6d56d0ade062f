//! Core library for the Vantage reconnaissance platform.
//!
//! Houses the scan orchestration engine: the scan lifecycle state machine,
//! the tool-plugin execution contract and built-in plugins, the dual-mode
//! cancellation coordinator, the live log broker, the schedule ticker, and
//! the persistence ports with their Postgres implementation.
#![allow(missing_docs)]

pub mod broker;
pub mod cancel;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod store;
pub mod ticker;
pub mod tools;

pub use broker::{LogBroker, LogLine};
pub use cancel::{CancellationCoordinator, ScanCancellation, StopOutcome};
pub use dispatcher::{CreateScanRequest, ScanDispatcher, ScanLauncher};
pub use error::{EngineError, Result};
pub use executor::ScanExecutor;
pub use store::{
    ClientStore, FindingStore, ProjectStore, ScanStore, ScheduleStore,
    ScheduleUpdate, Stores, memory::InMemoryStore, postgres::PostgresStore,
};
pub use ticker::ScheduleTicker;
pub use tools::{
    TargetKind, ToolContext, ToolDescriptor, ToolPlugin, ToolRegistry,
    ToolSettings,
};
