//! SerpApi search engine implementation

use super::context::CallContext;
use super::error::{EngineError, EngineResult};
use super::traits::*;
use crate::config::ProviderSettings;
use crate::network::{EngineRequest, EngineResponse, HttpClient};
use crate::scrape::PageScraper;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://serpapi.com/search.json";

type Extra = (&'static str, &'static str);

/// SerpApi Google search API
///
/// Every operation is a GET on a single endpoint; the upstream search
/// product is chosen with the `engine` query parameter. SerpApi has no
/// reviews search by query and no scrape endpoint, so pages are fetched
/// and extracted locally.
pub struct SerpApi {
    client: HttpClient,
    scraper: PageScraper,
    api_key: String,
    base_url: String,
    defaults: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl SerpApi {
    pub const NAME: &'static str = "serpapi";

    const OPTIONAL: [OperationKind; 9] = [
        OperationKind::NewsSearch,
        OperationKind::ImageSearch,
        OperationKind::VideoSearch,
        OperationKind::PlacesSearch,
        OperationKind::MapsSearch,
        OperationKind::ShoppingSearch,
        OperationKind::ScholarSearch,
        OperationKind::LensSearch,
        OperationKind::AutocompleteSearch,
    ];

    /// Tool option names and their SerpApi equivalents
    const OPTION_ALIASES: [(&'static str, &'static str); 3] =
        [("language", "hl"), ("country", "gl"), ("num_results", "num")];

    pub fn new(client: HttpClient, api_key: impl Into<String>) -> EngineResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EngineError::construction(
                Self::NAME,
                "SERPAPI_API_KEY is not set",
            ));
        }

        Ok(Self {
            scraper: PageScraper::new(client.clone()),
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            defaults: BTreeMap::new(),
            timeout: None,
        })
    }

    pub fn from_settings(settings: &ProviderSettings, client: HttpClient) -> EngineResult<Self> {
        let mut engine = Self::new(client, settings.api_key.clone().unwrap_or_default())?;
        if let Some(ref url) = settings.base_url {
            engine = engine.with_base_url(url);
        }
        engine.defaults = settings.defaults.clone();
        engine.timeout = settings
            .request_timeout()
            .map_err(|reason| EngineError::construction(Self::NAME, reason))?;
        Ok(engine)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Upstream `engine` parameter and any fixed extras for an operation
    fn upstream_engine(kind: OperationKind) -> Option<(&'static str, &'static [Extra])> {
        let mapping: (&'static str, &'static [Extra]) = match kind {
            OperationKind::WebSearch => ("google", &[]),
            OperationKind::NewsSearch => ("google_news", &[]),
            OperationKind::ImageSearch => ("google_images", &[]),
            OperationKind::VideoSearch => ("google_videos", &[]),
            OperationKind::PlacesSearch => ("google_local", &[]),
            OperationKind::MapsSearch => ("google_maps", &[("type", "search")]),
            OperationKind::ShoppingSearch => ("google_shopping", &[]),
            OperationKind::ScholarSearch => ("google_scholar", &[]),
            OperationKind::LensSearch => ("google_lens", &[]),
            OperationKind::AutocompleteSearch => ("google_autocomplete", &[]),
            OperationKind::ReviewsSearch | OperationKind::WebpageScrape => return None,
        };
        Some(mapping)
    }

    /// Build the HTTP request for a search operation
    fn request(&self, kind: OperationKind, params: &SearchParams) -> EngineResult<EngineRequest> {
        let (engine, extras) = Self::upstream_engine(kind)
            .ok_or_else(|| EngineError::unsupported(Self::NAME, kind))?;

        let mut merged: BTreeMap<&str, String> = BTreeMap::new();
        for (key, value) in &self.defaults {
            merged.insert(key.as_str(), value.clone());
        }
        for &(key, value) in extras {
            merged.insert(key, value.to_string());
        }
        for (key, value) in params.options_as(&Self::OPTION_ALIASES) {
            merged.insert(key, value.to_query_value());
        }

        // Lens takes the image URL in place of a text query
        let query_field = if kind == OperationKind::LensSearch {
            "url"
        } else {
            "q"
        };

        let mut request = EngineRequest::get(self.base_url.clone())
            .param("engine", engine)
            .param(query_field, params.query());
        for (key, value) in merged {
            if matches!(key, "engine" | "q" | "url" | "api_key") {
                continue;
            }
            request = request.param(key, value);
        }
        Ok(request.param("api_key", &self.api_key))
    }

    /// Decode a response, surfacing SerpApi's in-band `error` field
    fn decode(&self, response: EngineResponse) -> EngineResult<SearchResult> {
        if let Ok(Value::Object(body)) = response.json::<Value>() {
            if let Some(Value::String(message)) = body.get("error") {
                return Err(EngineError::upstream(
                    Self::NAME,
                    Some(response.status),
                    message.clone(),
                ));
            }
        }
        SearchResult::from_response(response, Self::NAME, self.version())
    }

    async fn search_kind(
        &self,
        ctx: &CallContext,
        kind: OperationKind,
        params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        let request = self.request(kind, params)?;
        let response = ctx
            .run(async {
                let outcome = match self.timeout {
                    Some(timeout) => self.client.execute_with_timeout(request, timeout).await,
                    None => self.client.execute(request).await,
                };
                outcome.map_err(|e| EngineError::upstream(Self::NAME, None, e.to_string()))
            })
            .await?;

        self.decode(response)
    }
}

#[async_trait]
impl Engine for SerpApi {
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
        self.scraper
            .scrape(ctx, params, Self::NAME, self.version())
            .await
    }
}
