//! In-memory engine used by unit tests

use super::context::CallContext;
use super::error::{EngineError, EngineResult};
use super::traits::{Engine, OperationKind, ScrapeParams, SearchParams, SearchResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Engine that echoes its inputs, with configurable capabilities and latency
pub struct StubEngine {
    name: String,
    version: String,
    optional: Vec<OperationKind>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StubEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0".to_string(),
            optional: Vec::new(),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn arc(name: &str) -> Arc<dyn Engine> {
        Arc::new(Self::new(name))
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn supporting(mut self, kinds: &[OperationKind]) -> Self {
        self.optional = kinds.to_vec();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter of calls that reached this engine
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    async fn respond(
        &self,
        ctx: &CallContext,
        kind: OperationKind,
        input: serde_json::Value,
    ) -> EngineResult<SearchResult> {
        if !self.supports(kind) {
            return Err(EngineError::unsupported(&self.name, kind));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        ctx.run(async {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            SearchResult::new(
                json!({
                    "engine": self.name,
                    "operation": kind,
                    "input": input,
                }),
                &self.name,
                &self.version,
            )
        })
        .await
    }
}

#[async_trait]
impl Engine for StubEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn optional_operations(&self) -> &[OperationKind] {
        &self.optional
    }

    async fn search(&self, ctx: &CallContext, params: &SearchParams) -> EngineResult<SearchResult> {
        self.respond(ctx, OperationKind::WebSearch, json!(params)).await
    }

    async fn search_news(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.respond(ctx, OperationKind::NewsSearch, json!(params)).await
    }

    async fn search_images(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.respond(ctx, OperationKind::ImageSearch, json!(params)).await
    }

    async fn search_autocomplete(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.respond(ctx, OperationKind::AutocompleteSearch, json!(params))
            .await
    }

    async fn scrape_webpage(
        &self,
        ctx: &CallContext,
        params: &ScrapeParams,
    ) -> EngineResult<SearchResult> {
        self.respond(ctx, OperationKind::WebpageScrape, json!(params)).await
    }
}
