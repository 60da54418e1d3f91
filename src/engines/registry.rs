//! Engine registry for managing constructed search engines

use super::error::{EngineError, EngineResult};
use super::traits::{Engine, EngineDescriptor};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of constructed search engines
///
/// Append-only and keyed by engine name. Registering a name that is already
/// present replaces the engine (last write wins) while keeping the name's
/// original position in [`EngineRegistry::list`].
///
/// Registration happens during single-threaded startup; afterwards the
/// registry is read-only and can be shared freely.
pub struct EngineRegistry {
    /// Engines by name
    engines: HashMap<String, Arc<dyn Engine>>,
    /// Names in registration order
    order: Vec<String>,
}

impl EngineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register an engine under its reported name
    ///
    /// Returns the engine previously registered under that name, if any.
    pub fn register(&mut self, engine: Arc<dyn Engine>) -> EngineResult<Option<Arc<dyn Engine>>> {
        let name = engine.name().to_string();
        if name.trim().is_empty() {
            return Err(EngineError::construction(
                "<unnamed>",
                "engine reported an empty name",
            ));
        }

        let previous = self.engines.insert(name.clone(), engine);
        if previous.is_none() {
            self.order.push(name);
        }
        Ok(previous)
    }

    /// Engine names in registration order
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Engine>> {
        self.engines.get(name)
    }

    /// Engines in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Engine>> {
        self.order.iter().filter_map(|name| self.engines.get(name))
    }

    /// Descriptors of all engines in registration order
    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        self.iter().map(|engine| engine.descriptor()).collect()
    }

    /// Check if an engine exists
    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Get number of registered engines
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
