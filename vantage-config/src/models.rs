use serde::{Deserialize, Serialize};

/// Fully resolved runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub workers: WorkerConfig,
    pub tool_apis: ToolApiConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Postgres connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Worker-pool and ticker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent scan executions; one worker context per scan.
    pub scan_permits: usize,
    /// Schedule ticker period, seconds.
    pub schedule_tick_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_permits: 4,
            schedule_tick_secs: 60,
        }
    }
}

/// Credentials and endpoints for remote tool plugins. Absent values are
/// configuration gaps: the affected plugin yields no findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolApiConfig {
    pub hibp_api_key: Option<String>,
    pub spiderfoot_url: Option<String>,
}
