//! Web server module
//!
//! Serves the MCP endpoint over HTTP along with health and stats routes.

mod handlers;
mod routes;
mod state;

pub use routes::{create_router, serve};
pub use state::AppState;
