//! Dynamic tool binding
//!
//! A [`Dispatcher`] publishes one tool per operation the bound engine
//! supports and routes tool calls to the matching engine method.

mod schema;

pub use schema::input_schema;

use crate::cache::{tool_cache_key, ResultCache};
use crate::engines::{
    CallContext, Engine, EngineError, EngineResult, OperationKind, ScrapeParams, SearchParams,
    SearchResult,
};
use crate::metrics::Metrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Tool definition as listed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Failure of a tool call
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool is not published for the bound engine
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Engine call failed; carries the tool name for context
    #[error("{tool} failed: {source}")]
    Failed { tool: String, source: EngineError },
}

impl ToolError {
    fn failed(tool: &str, source: EngineError) -> Self {
        Self::Failed {
            tool: tool.to_string(),
            source,
        }
    }

    /// Underlying engine error, if the tool was found
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::NotFound(_) => None,
            Self::Failed { source, .. } => Some(source),
        }
    }
}

type EngineCall<'a> = Pin<Box<dyn Future<Output = EngineResult<SearchResult>> + Send + 'a>>;

/// Routes tool calls to the selected engine
pub struct Dispatcher {
    engine: Arc<dyn Engine>,
    operations: Vec<OperationKind>,
    cache: Option<ResultCache>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    /// Bind an engine, publishing a tool for every operation it supports
    pub fn bind(engine: Arc<dyn Engine>) -> Self {
        let operations = OperationKind::ALL
            .into_iter()
            .filter(|&kind| kind.is_required() || engine.supports(kind))
            .collect();

        Self {
            engine,
            operations,
            cache: None,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Published operations in catalog order
    pub fn operations(&self) -> &[OperationKind] {
        &self.operations
    }

    /// Published tool names in catalog order
    pub fn tool_names(&self) -> Vec<&'static str> {
        self.operations.iter().map(|kind| kind.tool_name()).collect()
    }

    pub fn is_published(&self, tool: &str) -> bool {
        self.lookup(tool).is_some()
    }

    /// Definitions of the published tools
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.operations
            .iter()
            .map(|&kind| ToolDefinition {
                name: kind.tool_name().to_string(),
                description: kind.description().to_string(),
                input_schema: input_schema(kind),
            })
            .collect()
    }

    fn lookup(&self, tool: &str) -> Option<OperationKind> {
        OperationKind::from_tool_name(tool).filter(|kind| self.operations.contains(kind))
    }

    /// Invoke a published tool
    ///
    /// Returns the result data as pretty-printed JSON. Errors from the
    /// engine are wrapped with the tool name.
    pub async fn call(
        &self,
        ctx: &CallContext,
        tool: &str,
        arguments: Value,
    ) -> Result<String, ToolError> {
        let kind = self
            .lookup(tool)
            .ok_or_else(|| ToolError::NotFound(tool.to_string()))?;

        self.metrics.record_call(tool);
        let cache_key = self
            .cache
            .as_ref()
            .map(|_| tool_cache_key(self.engine.name(), tool, &arguments));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key).await {
                debug!("Cache hit for {}", tool);
                self.metrics.record_cache_hit();
                self.metrics.record_success(tool);
                return Ok(hit);
            }
        }

        let started = Instant::now();
        let outcome = self.invoke(ctx, kind, arguments).await.and_then(|result| {
            serde_json::to_string_pretty(result.data())
                .map_err(|e| EngineError::upstream(result.source_engine(), None, e.to_string()))
        });
        self.metrics
            .record_response_time(tool, started.elapsed().as_millis() as u64);

        match outcome {
            Ok(text) => {
                self.metrics.record_success(tool);
                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    cache.set(key, text.clone()).await;
                }
                Ok(text)
            }
            Err(e) => {
                self.metrics.record_error(tool, e.kind());
                if e.is_caller_error() {
                    debug!("{} rejected: {}", tool, e);
                } else {
                    warn!("{} failed: {}", tool, e);
                }
                Err(ToolError::failed(tool, e))
            }
        }
    }

    /// Parse arguments and run the engine method for `kind`
    async fn invoke(
        &self,
        ctx: &CallContext,
        kind: OperationKind,
        arguments: Value,
    ) -> EngineResult<SearchResult> {
        if !self.engine.supports(kind) {
            return Err(EngineError::unsupported(self.engine.name(), kind));
        }

        debug!("Calling {} on {}", kind, self.engine.name());
        if kind == OperationKind::WebpageScrape {
            let params = ScrapeParams::from_arguments(arguments)?;
            return ctx.run(self.engine.scrape_webpage(ctx, &params)).await;
        }

        let params = SearchParams::from_arguments(arguments)?;
        ctx.run(search_call(self.engine.as_ref(), ctx, kind, &params))
            .await
    }
}

/// Engine method serving a search operation
fn search_call<'a>(
    engine: &'a dyn Engine,
    ctx: &'a CallContext,
    kind: OperationKind,
    params: &'a SearchParams,
) -> EngineCall<'a> {
    match kind {
        OperationKind::WebSearch => engine.search(ctx, params),
        OperationKind::NewsSearch => engine.search_news(ctx, params),
        OperationKind::ImageSearch => engine.search_images(ctx, params),
        OperationKind::VideoSearch => engine.search_videos(ctx, params),
        OperationKind::PlacesSearch => engine.search_places(ctx, params),
        OperationKind::MapsSearch => engine.search_maps(ctx, params),
        OperationKind::ReviewsSearch => engine.search_reviews(ctx, params),
        OperationKind::ShoppingSearch => engine.search_shopping(ctx, params),
        OperationKind::ScholarSearch => engine.search_scholar(ctx, params),
        OperationKind::LensSearch => engine.search_lens(ctx, params),
        OperationKind::AutocompleteSearch => engine.search_autocomplete(ctx, params),
        OperationKind::WebpageScrape => {
            let err = EngineError::invalid_params("webpage_scrape takes a url, not a query");
            Box::pin(async move { Err(err) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::testing::StubEngine;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn dispatcher(kinds: &[OperationKind]) -> Dispatcher {
        Dispatcher::bind(Arc::new(StubEngine::new("stub").supporting(kinds)))
    }

    #[test]
    fn test_publishes_required_tools() {
        let dispatcher = dispatcher(&[]);
        assert_eq!(dispatcher.tool_names(), vec!["web_search", "webpage_scrape"]);
    }

    #[test]
    fn test_publishes_iff_supported() {
        let dispatcher = dispatcher(&[OperationKind::ImageSearch, OperationKind::NewsSearch]);
        assert_eq!(
            dispatcher.tool_names(),
            vec!["web_search", "news_search", "image_search", "webpage_scrape"]
        );
        for kind in OperationKind::ALL {
            assert_eq!(
                dispatcher.is_published(kind.tool_name()),
                dispatcher.engine().supports(kind)
            );
        }
    }

    #[test]
    fn test_definitions() {
        let definitions = dispatcher(&[OperationKind::LensSearch]).definitions();
        let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["web_search", "lens_search", "webpage_scrape"]);

        let json = serde_json::to_value(&definitions[0]).unwrap();
        assert_eq!(json["description"], "Perform a web search");
        assert!(json.get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_call_returns_pretty_data() {
        let dispatcher = dispatcher(&[OperationKind::ImageSearch]);
        let text = dispatcher
            .call(&CallContext::new(), "image_search", json!({"query": "ferris"}))
            .await
            .unwrap();

        assert!(text.contains('\n'));
        let data: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(data["operation"], "image_search");
        assert_eq!(data["input"]["query"], "ferris");
    }

    #[tokio::test]
    async fn test_unpublished_tool_not_found() {
        let dispatcher = dispatcher(&[]);
        let err = dispatcher
            .call(&CallContext::new(), "image_search", json!({"query": "ferris"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(ref name) if name == "image_search"));

        let err = dispatcher
            .call(&CallContext::new(), "no_such_tool", json!({}))
            .await
            .unwrap_err();
        assert!(err.engine_error().is_none());
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_engine() {
        let engine = StubEngine::new("stub");
        let calls = engine.call_counter();
        let dispatcher = Dispatcher::bind(Arc::new(engine));

        let err = dispatcher
            .call(&CallContext::new(), "web_search", json!({"query": "   "}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "web_search failed: invalid parameters: query must not be empty"
        );
        assert!(matches!(
            err.engine_error(),
            Some(EngineError::InvalidParams(_))
        ));

        let err = dispatcher
            .call(&CallContext::new(), "webpage_scrape", json!({"url": "ftp://x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("webpage_scrape failed:"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let dispatcher = Dispatcher::bind(Arc::new(
            StubEngine::new("slow").with_delay(Duration::from_secs(10)),
        ));
        let ctx = CallContext::new().timeout(Duration::from_millis(50));
        let err = dispatcher
            .call(&ctx, "web_search", json!({"query": "rust"}))
            .await
            .unwrap_err();
        assert!(matches!(err.engine_error(), Some(EngineError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cache_skips_engine() {
        let engine = StubEngine::new("stub");
        let calls = engine.call_counter();
        let dispatcher = Dispatcher::bind(Arc::new(engine)).with_cache(ResultCache::new(60, 10));

        let first = dispatcher
            .call(&CallContext::new(), "web_search", json!({"query": "rust"}))
            .await
            .unwrap();
        let second = dispatcher
            .call(&CallContext::new(), "web_search", json!({"query": "rust"}))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.total_calls, 2);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_failures_are_recorded() {
        let dispatcher = dispatcher(&[]);
        let _ = dispatcher
            .call(&CallContext::new(), "web_search", json!({}))
            .await;

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.tools["web_search"].errors["invalid_params"], 1);
    }
}
