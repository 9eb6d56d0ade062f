//! # Vantage Server
//!
//! Reconnaissance orchestration server.
//!
//! ## Overview
//!
//! Vantage runs long-running scan jobs that execute a sequence of external
//! OSINT tools against a target:
//!
//! - **Scan orchestration**: worker-pool execution with a monotonic
//!   lifecycle state machine and dual-mode cancellation
//! - **Live logs**: per-scan SSE streams of tool output
//! - **Findings**: normalized, append-only discovered facts with CSV export
//! - **Schedules**: recurring definitions that spawn new scans on a fixed
//!   interval
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for persistent storage
//! - tokio broadcast channels for live log fan-out
//! - external executables and HTTP APIs as tool plugins

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use state::AppState;
