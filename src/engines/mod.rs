//! Search engine module
//!
//! Defines the Engine capability trait, the registry of constructed engines
//! and the selector that picks the one engine serving a process run.

mod context;
mod error;
mod loader;
mod registry;
mod selector;
mod traits;

// Engine implementations
pub mod serpapi;
pub mod serper;

#[cfg(test)]
pub(crate) mod testing;

pub use context::CallContext;
pub use error::{EngineError, EngineResult};
pub use loader::{EngineLoader, LoadReport};
pub use registry::EngineRegistry;
pub use selector::{select_default, Selector};
pub use traits::*;
