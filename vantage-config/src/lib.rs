//! Shared configuration library for Vantage.
//!
//! Centralizes `.env` loading, typed settings models, defaults, and
//! validation rules so the server binary and the test harness share a single
//! source of truth.

pub mod loader;
pub mod models;

pub use loader::{ConfigError, load};
pub use models::{DatabaseConfig, ServerConfig, Settings, ToolApiConfig, WorkerConfig};
