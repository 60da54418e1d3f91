//! Metasearch-MCP: web search and scraping tools backed by interchangeable providers
//!
//! Providers are constructed once at startup and collected into an
//! [`EngineRegistry`]. A [`Selector`] picks the one engine that serves every
//! request for the lifetime of the process, and the [`Dispatcher`] publishes a
//! tool for each operation that engine supports.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod engines;
pub mod error;
pub mod mcp;
pub mod metrics;
pub mod network;
pub mod scrape;
pub mod web;

pub use config::Settings;
pub use dispatch::{Dispatcher, ToolDefinition, ToolError};
pub use engines::{
    CallContext, Engine, EngineError, EngineRegistry, OperationKind, ScrapeParams, SearchParams,
    SearchResult, Selector,
};
pub use error::{Error, Result};
pub use mcp::McpServer;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default outbound request timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 15;

/// Default per-tool-call deadline in seconds
pub const DEFAULT_CALL_TIMEOUT: u64 = 60;

/// Upper bound on any configured timeout in seconds
pub const MAX_TIMEOUT: u64 = 24 * 60 * 60;
