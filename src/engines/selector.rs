//! Selection of the single engine that serves a process run

use super::error::{EngineError, EngineResult};
use super::registry::EngineRegistry;
use super::traits::Engine;
use crate::config::SelectionSettings;
use std::sync::Arc;
use tracing::{info, warn};

/// Deterministic engine selection
///
/// Rules, in order:
/// 1. the preferred engine, when it is registered
/// 2. the only engine, when exactly one is registered
/// 3. the first name of the priority list that is registered
/// 4. the first engine in registration order
///
/// An empty registry fails with [`EngineError::NoEngineAvailable`]. A
/// preferred name that is not registered is logged and ignored.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    preferred: Option<String>,
    priority: Vec<String>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &SelectionSettings) -> Self {
        Self {
            preferred: settings.preferred.clone(),
            priority: settings.priority.clone(),
        }
    }

    pub fn preferred(mut self, name: impl Into<String>) -> Self {
        self.preferred = Some(name.into());
        self
    }

    pub fn priority<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = names.into_iter().map(Into::into).collect();
        self
    }

    /// Pick one engine from the registry
    pub fn select(&self, registry: &EngineRegistry) -> EngineResult<Arc<dyn Engine>> {
        if registry.is_empty() {
            return Err(EngineError::NoEngineAvailable);
        }

        let preferred = self
            .preferred
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        if let Some(name) = preferred {
            if let Some(engine) = registry.get(name) {
                info!("Selected preferred engine: {}", name);
                return Ok(Arc::clone(engine));
            }
            warn!(
                "Preferred engine {} is not available; falling back to {:?}",
                name,
                registry.list()
            );
        }

        if let Some(engine) = self
            .priority
            .iter()
            .find_map(|name| registry.get(name))
        {
            return Ok(Arc::clone(engine));
        }

        registry
            .iter()
            .next()
            .cloned()
            .ok_or(EngineError::NoEngineAvailable)
    }
}

/// Select with only an optional preference, ties broken by registration order
pub fn select_default(
    registry: &EngineRegistry,
    preferred: Option<&str>,
) -> EngineResult<Arc<dyn Engine>> {
    let mut selector = Selector::new();
    if let Some(name) = preferred {
        selector = selector.preferred(name);
    }
    selector.select(registry)
}
