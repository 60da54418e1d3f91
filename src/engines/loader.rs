//! Engine loader for constructing providers from configuration

use super::error::{EngineError, EngineResult};
use super::registry::EngineRegistry;
use super::serpapi::SerpApi;
use super::serper::Serper;
use super::traits::Engine;
use crate::config::{ProviderSettings, Settings};
use crate::network::HttpClient;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of loading providers
///
/// Construction failures are not fatal; they are kept so the caller can
/// report them.
pub struct LoadReport {
    pub registry: EngineRegistry,
    pub failures: Vec<EngineError>,
}

/// Loader for initializing engines from configuration
pub struct EngineLoader;

impl EngineLoader {
    /// Providers in registration order
    pub const PROVIDERS: [&'static str; 2] = [Serper::NAME, SerpApi::NAME];

    /// Construct every enabled provider and register the ones that succeed
    pub fn load(settings: &Settings, client: &HttpClient) -> LoadReport {
        let attempts = Self::PROVIDERS.iter().filter_map(|&name| {
            let config = Self::provider_settings(settings, name)?;
            if config.disabled {
                info!("Skipping disabled engine: {}", name);
                return None;
            }
            Some(Self::create_engine(name, config, client.clone()))
        });

        Self::collect(attempts)
    }

    /// Register successful constructions in order, keeping failures
    pub fn collect<I>(attempts: I) -> LoadReport
    where
        I: IntoIterator<Item = EngineResult<Arc<dyn Engine>>>,
    {
        let mut registry = EngineRegistry::new();
        let mut failures = Vec::new();

        for attempt in attempts {
            match attempt.and_then(|engine| {
                let name = engine.name().to_string();
                let version = engine.version().to_string();
                registry.register(engine).map(|_| (name, version))
            }) {
                Ok((name, version)) => info!("Registered {} engine v{}", name, version),
                Err(e) => {
                    warn!("{}", e);
                    failures.push(e);
                }
            }
        }

        info!("Loaded {} engines", registry.len());
        LoadReport { registry, failures }
    }

    /// Create an engine instance by name
    pub fn create_engine(
        name: &str,
        config: &ProviderSettings,
        client: HttpClient,
    ) -> EngineResult<Arc<dyn Engine>> {
        let engine: Arc<dyn Engine> = match name {
            Serper::NAME => Arc::new(Serper::from_settings(config, client)?),
            SerpApi::NAME => Arc::new(SerpApi::from_settings(config, client)?),
            _ => {
                return Err(EngineError::construction(name, "unknown engine type"));
            }
        };
        Ok(engine)
    }

    fn provider_settings<'a>(settings: &'a Settings, name: &str) -> Option<&'a ProviderSettings> {
        match name {
            Serper::NAME => Some(&settings.engines.serper),
            SerpApi::NAME => Some(&settings.engines.serpapi),
            _ => None,
        }
    }
}
