//! Model Context Protocol surface
//!
//! JSON-RPC 2.0 over stdio (one message per line) or over HTTP through the
//! web module.

pub mod protocol;
mod server;

pub use protocol::{JsonRpcRequest, JsonRpcResponse, ToolResult, PROTOCOL_VERSION};
pub use server::McpServer;
