//! HTTP networking module
//!
//! Provides the outbound HTTP client shared by all search providers.

mod client;
mod request;
mod user_agent;

pub use client::HttpClient;
pub use request::{EngineRequest, EngineResponse, HttpMethod, RequestBody};
pub use user_agent::{accept_html, accept_json, accept_language, generate_user_agent};
