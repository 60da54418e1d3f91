//! Application state shared across handlers

use crate::mcp::McpServer;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Protocol handler, shared with no other transport
    pub server: Arc<McpServer>,
    /// Process start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            started_at: Utc::now(),
        }
    }

    /// Seconds since the state was created
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
