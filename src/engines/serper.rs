//! Serper.dev search engine implementation

use super::context::CallContext;
use super::error::{EngineError, EngineResult};
use super::traits::*;
use crate::config::ProviderSettings;
use crate::network::{EngineRequest, HttpClient};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev";
const DEFAULT_SCRAPE_URL: &str = "https://scrape.serper.dev";

/// Serper.dev Google search API
///
/// Every operation is a JSON POST to `<base_url>/<endpoint>` authenticated
/// with the `X-API-KEY` header.
pub struct Serper {
    client: HttpClient,
    api_key: String,
    base_url: String,
    scrape_url: String,
    defaults: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl Serper {
    pub const NAME: &'static str = "serper";

    const OPTIONAL: [OperationKind; 10] = [
        OperationKind::NewsSearch,
        OperationKind::ImageSearch,
        OperationKind::VideoSearch,
        OperationKind::PlacesSearch,
        OperationKind::MapsSearch,
        OperationKind::ReviewsSearch,
        OperationKind::ShoppingSearch,
        OperationKind::ScholarSearch,
        OperationKind::LensSearch,
        OperationKind::AutocompleteSearch,
    ];

    /// Tool option names and their Serper equivalents
    const OPTION_ALIASES: [(&'static str, &'static str); 3] =
        [("language", "hl"), ("country", "gl"), ("num_results", "num")];

    pub fn new(client: HttpClient, api_key: impl Into<String>) -> EngineResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EngineError::construction(
                Self::NAME,
                "SERPER_API_KEY is not set",
            ));
        }

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            scrape_url: DEFAULT_SCRAPE_URL.to_string(),
            defaults: BTreeMap::new(),
            timeout: None,
        })
    }

    pub fn from_settings(settings: &ProviderSettings, client: HttpClient) -> EngineResult<Self> {
        let mut engine = Self::new(client, settings.api_key.clone().unwrap_or_default())?;
        if let Some(ref url) = settings.base_url {
            engine = engine.with_base_url(url);
        }
        if let Some(ref url) = settings.scrape_url {
            engine.scrape_url = url.trim_end_matches('/').to_string();
        }
        engine.defaults = settings.defaults.clone();
        engine.timeout = settings
            .request_timeout()
            .map_err(|reason| EngineError::construction(Self::NAME, reason))?;
        Ok(engine)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// API path for an operation
    fn endpoint(kind: OperationKind) -> &'static str {
        match kind {
            OperationKind::WebSearch => "search",
            OperationKind::NewsSearch => "news",
            OperationKind::ImageSearch => "images",
            OperationKind::VideoSearch => "videos",
            OperationKind::PlacesSearch => "places",
            OperationKind::MapsSearch => "maps",
            OperationKind::ReviewsSearch => "reviews",
            OperationKind::ShoppingSearch => "shopping",
            OperationKind::ScholarSearch => "scholar",
            OperationKind::LensSearch => "lens",
            OperationKind::AutocompleteSearch => "autocomplete",
            OperationKind::WebpageScrape => "",
        }
    }

    /// Build the HTTP request for a search operation
    fn request(&self, kind: OperationKind, params: &SearchParams) -> EngineRequest {
        let mut body = Map::new();
        for (key, value) in &self.defaults {
            body.insert(key.clone(), Value::String(value.clone()));
        }
        for (key, value) in params.options_as(&Self::OPTION_ALIASES) {
            body.insert(key.to_string(), value.to_json());
        }

        // Lens takes the image URL in place of a text query
        let query_field = if kind == OperationKind::LensSearch {
            "url"
        } else {
            "q"
        };
        body.insert(query_field.to_string(), Value::String(params.query().to_string()));

        EngineRequest::post(format!("{}/{}", self.base_url, Self::endpoint(kind)))
            .header("X-API-KEY", &self.api_key)
            .json(Value::Object(body))
    }

    async fn send(&self, ctx: &CallContext, request: EngineRequest) -> EngineResult<SearchResult> {
        let response = ctx
            .run(async {
                let outcome = match self.timeout {
                    Some(timeout) => self.client.execute_with_timeout(request, timeout).await,
                    None => self.client.execute(request).await,
                };
                outcome.map_err(|e| EngineError::upstream(Self::NAME, None, e.to_string()))
            })
            .await?;

        SearchResult::from_response(response, Self::NAME, self.version())
    }

    async fn search_kind(
        &self,
        ctx: &CallContext,
        kind: OperationKind,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.send(ctx, self.request(kind, params)).await
    }
}

#[async_trait]
impl Engine for Serper {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        crate::VERSION
    }

    fn optional_operations(&self) -> &[OperationKind] {
        &Self::OPTIONAL
    }

    async fn search(&self, ctx: &CallContext, params: &SearchParams) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::WebSearch, params).await
    }

    async fn search_news(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::NewsSearch, params).await
    }

    async fn search_images(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::ImageSearch, params).await
    }

    async fn search_videos(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::VideoSearch, params).await
    }

    async fn search_places(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::PlacesSearch, params).await
    }

    async fn search_maps(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::MapsSearch, params).await
    }

    async fn search_reviews(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::ReviewsSearch, params).await
    }

    async fn search_shopping(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::ShoppingSearch, params).await
    }

    async fn search_scholar(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::ScholarSearch, params).await
    }

    async fn search_lens(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::LensSearch, params).await
    }

    async fn search_autocomplete(
        &self,
        ctx: &CallContext,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        self.search_kind(ctx, OperationKind::AutocompleteSearch, params)
            .await
    }

    async fn scrape_webpage(
        &self,
        ctx: &CallContext,
        params: &ScrapeParams,
    ) -> EngineResult<SearchResult> {
        let request = EngineRequest::post(self.scrape_url.clone())
            .header("X-API-KEY", &self.api_key)
            .json(serde_json::json!({ "url": params.url() }));
        self.send(ctx, request).await
    }
}
