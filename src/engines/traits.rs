//! Engine traits and types

use super::context::CallContext;
use super::error::{EngineError, EngineResult};
use crate::network::EngineResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use url::Url;

/// Category of search or scrape operation an engine may serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    WebSearch,
    NewsSearch,
    ImageSearch,
    VideoSearch,
    PlacesSearch,
    MapsSearch,
    ReviewsSearch,
    ShoppingSearch,
    ScholarSearch,
    LensSearch,
    AutocompleteSearch,
    WebpageScrape,
}

impl OperationKind {
    /// Every operation, in tool catalog order
    pub const ALL: [OperationKind; 12] = [
        OperationKind::WebSearch,
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
        OperationKind::WebpageScrape,
    ];

    /// Name of the tool published for this operation
    pub const fn tool_name(self) -> &'static str {
        match self {
            OperationKind::WebSearch => "web_search",
            OperationKind::NewsSearch => "news_search",
            OperationKind::ImageSearch => "image_search",
            OperationKind::VideoSearch => "video_search",
            OperationKind::PlacesSearch => "places_search",
            OperationKind::MapsSearch => "maps_search",
            OperationKind::ReviewsSearch => "reviews_search",
            OperationKind::ShoppingSearch => "shopping_search",
            OperationKind::ScholarSearch => "scholar_search",
            OperationKind::LensSearch => "lens_search",
            OperationKind::AutocompleteSearch => "autocomplete_search",
            OperationKind::WebpageScrape => "webpage_scrape",
        }
    }

    /// Human readable description of the published tool
    pub const fn description(self) -> &'static str {
        match self {
            OperationKind::WebSearch => "Perform a web search",
            OperationKind::NewsSearch => "Search for news articles",
            OperationKind::ImageSearch => "Search for images",
            OperationKind::VideoSearch => "Search for videos",
            OperationKind::PlacesSearch => "Search for places and local businesses",
            OperationKind::MapsSearch => "Search for locations on a map",
            OperationKind::ReviewsSearch => "Search for reviews of a place or business",
            OperationKind::ShoppingSearch => "Search for products",
            OperationKind::ScholarSearch => "Search for academic papers",
            OperationKind::LensSearch => "Perform a visual search from an image URL",
            OperationKind::AutocompleteSearch => "Get search suggestions for a partial query",
            OperationKind::WebpageScrape => "Scrape content from a webpage",
        }
    }

    /// Operations every engine must serve
    pub const fn is_required(self) -> bool {
        matches!(self, OperationKind::WebSearch | OperationKind::WebpageScrape)
    }

    /// Look up an operation by its tool name
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tool_name() == name)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// Scalar value of an engine-specific search option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    fn from_json(key: &str, value: &Value) -> EngineResult<Self> {
        match value {
            Value::Bool(b) => Ok(OptionValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(OptionValue::Integer)
                .or_else(|| n.as_f64().map(OptionValue::Float))
                .ok_or_else(|| {
                    EngineError::invalid_params(format!("option `{}` is not a valid number", key))
                }),
            Value::String(s) => Ok(OptionValue::Text(s.clone())),
            _ => Err(EngineError::invalid_params(format!(
                "option `{}` must be a string, number or boolean",
                key
            ))),
        }
    }

    /// Render for use in a URL query string
    pub fn to_query_value(&self) -> String {
        match self {
            OptionValue::Bool(b) => b.to_string(),
            OptionValue::Integer(i) => i.to_string(),
            OptionValue::Float(f) => f.to_string(),
            OptionValue::Text(s) => s.clone(),
        }
    }

    /// Render for use in a JSON request body
    pub fn to_json(&self) -> Value {
        match self {
            OptionValue::Bool(b) => Value::Bool(*b),
            OptionValue::Integer(i) => Value::from(*i),
            OptionValue::Float(f) => Value::from(*f),
            OptionValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

/// Parameters of a search request
///
/// The query is validated on construction and never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchParams {
    query: String,
    options: BTreeMap<String, OptionValue>,
}

impl SearchParams {
    /// Create parameters for a query with no options
    pub fn new(query: impl Into<String>) -> EngineResult<Self> {
        Self::with_options(query, BTreeMap::new())
    }

    /// Create parameters for a query with engine-specific options
    pub fn with_options(
        query: impl Into<String>,
        options: BTreeMap<String, OptionValue>,
    ) -> EngineResult<Self> {
        let query = query.into();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(EngineError::invalid_params("query must not be empty"));
        }

        Ok(Self {
            query: trimmed.to_string(),
            options,
        })
    }

    /// Build parameters from tool call arguments
    ///
    /// Accepts `{"query": ..., "options": {...}}`. Any other top-level scalar
    /// (`location`, `language`, `num_results`, ...) is folded into the options
    /// and takes precedence over an entry of the same name in `options`.
    pub fn from_arguments(arguments: Value) -> EngineResult<Self> {
        let mut object = expect_object(arguments, "query")?;

        let query = match object.remove("query") {
            Some(Value::String(query)) => query,
            Some(_) => return Err(EngineError::invalid_params("`query` must be a string")),
            None => return Err(EngineError::invalid_params("missing required field `query`")),
        };

        let mut options = BTreeMap::new();
        match object.remove("options") {
            Some(Value::Object(explicit)) => {
                for (key, value) in explicit {
                    let value = OptionValue::from_json(&key, &value)?;
                    options.insert(key, value);
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => return Err(EngineError::invalid_params("`options` must be an object")),
        }

        for (key, value) in object {
            if value.is_null() {
                continue;
            }
            let value = OptionValue::from_json(&key, &value)?;
            options.insert(key, value);
        }

        Self::with_options(query, options)
    }

    /// Return a copy with one more option set
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn options(&self) -> &BTreeMap<String, OptionValue> {
        &self.options
    }

    pub fn option(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// Options with names translated through `aliases` (`(common, upstream)` pairs)
    pub fn options_as<'a>(
        &'a self,
        aliases: &'a [(&'a str, &'a str)],
    ) -> impl Iterator<Item = (&'a str, &'a OptionValue)> + 'a {
        self.options.iter().map(move |(key, value)| {
            let name = aliases
                .iter()
                .find(|(common, _)| *common == key.as_str())
                .map(|&(_, upstream)| upstream)
                .unwrap_or(key.as_str());
            (name, value)
        })
    }
}

/// Parameters of a webpage scrape request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeParams {
    url: String,
}

impl ScrapeParams {
    /// Validate an absolute http(s) URL
    pub fn new(url: &str) -> EngineResult<Self> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| EngineError::invalid_params(format!("invalid url `{}`: {}", url, e)))?;

        match parsed.scheme() {
            "http" | "https" => Ok(Self {
                url: parsed.to_string(),
            }),
            scheme => Err(EngineError::invalid_params(format!(
                "unsupported url scheme `{}`",
                scheme
            ))),
        }
    }

    /// Build parameters from tool call arguments (`{"url": ...}`)
    pub fn from_arguments(arguments: Value) -> EngineResult<Self> {
        let mut object = expect_object(arguments, "url")?;
        match object.remove("url") {
            Some(Value::String(url)) => Self::new(&url),
            Some(_) => Err(EngineError::invalid_params("`url` must be a string")),
            None => Err(EngineError::invalid_params("missing required field `url`")),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn expect_object(arguments: Value, required: &str) -> EngineResult<Map<String, Value>> {
    match arguments {
        Value::Object(object) => Ok(object),
        Value::Null => Err(EngineError::invalid_params(format!(
            "missing arguments: expected an object with a `{}` field",
            required
        ))),
        _ => Err(EngineError::invalid_params("arguments must be a JSON object")),
    }
}

/// Structured data returned by an engine, tagged with its source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    data: Value,
    source_engine: String,
    source_version: String,
}

impl SearchResult {
    /// Wrap provider data; `null` or an empty object is reported as [`EngineError::NoData`]
    pub fn new(
        data: Value,
        source_engine: impl Into<String>,
        source_version: impl Into<String>,
    ) -> EngineResult<Self> {
        let source_engine = source_engine.into();
        let empty = match &data {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            return Err(EngineError::NoData {
                engine: source_engine,
            });
        }

        Ok(Self {
            data,
            source_engine,
            source_version: source_version.into(),
        })
    }

    /// Decode a JSON provider response, mapping HTTP failures to upstream errors
    pub fn from_response(
        response: EngineResponse,
        engine: &str,
        version: &str,
    ) -> EngineResult<Self> {
        if response.is_rate_limited() {
            return Err(EngineError::upstream(
                engine,
                Some(response.status),
                "rate limited by provider",
            ));
        }
        if !response.is_success() {
            return Err(EngineError::upstream(
                engine,
                Some(response.status),
                format!("HTTP {}: {}", response.status, response.snippet(200)),
            ));
        }

        let data: Value = response.json().map_err(|e| {
            EngineError::upstream(
                engine,
                Some(response.status),
                format!("malformed response: {}", e),
            )
        })?;

        Self::new(data, engine, version)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn source_engine(&self) -> &str {
        &self.source_engine
    }

    pub fn source_version(&self) -> &str {
        &self.source_version
    }

    pub fn into_data(self) -> Value {
        self.data
    }
}

/// Identity and capabilities of an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineDescriptor {
    pub name: String,
    pub version: String,
    pub supported_operations: BTreeSet<OperationKind>,
}

/// Capability interface every search provider implements
///
/// `search` and `scrape_webpage` are required. Every other operation has a
/// default body returning [`EngineError::Unsupported`]; an engine serving one
/// overrides the method and lists the kind in [`Engine::optional_operations`],
/// so support can be queried without calling it.
///
/// Implementations must run their network I/O through
/// [`CallContext::run`] so cancellation and deadlines are honored.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Engine name, used as the registry key
    fn name(&self) -> &str;

    /// Engine version
    fn version(&self) -> &str;

    /// Optional operations this engine serves
    fn optional_operations(&self) -> &[OperationKind] {
        &[]
    }

    /// Whether this engine serves an operation
    fn supports(&self, kind: OperationKind) -> bool {
        kind.is_required() || self.optional_operations().contains(&kind)
    }

    fn descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            name: self.name().to_string(),
            version: self.version().to_string(),
            supported_operations: OperationKind::ALL
                .into_iter()
                .filter(|kind| self.supports(*kind))
                .collect(),
        }
    }

    /// General web search
    async fn search(&self, ctx: &CallContext, params: &SearchParams) -> EngineResult<SearchResult>;

    async fn search_news(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::NewsSearch))
    }

    async fn search_images(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::ImageSearch))
    }

    async fn search_videos(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::VideoSearch))
    }

    async fn search_places(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::PlacesSearch))
    }

    async fn search_maps(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::MapsSearch))
    }

    async fn search_reviews(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::ReviewsSearch))
    }

    async fn search_shopping(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::ShoppingSearch))
    }

    async fn search_scholar(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::ScholarSearch))
    }

    async fn search_lens(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(self.name(), OperationKind::LensSearch))
    }

    async fn search_autocomplete(
        &self,
        _ctx: &CallContext,
        _params: &SearchParams,
    ) -> EngineResult<SearchResult> {
        Err(EngineError::unsupported(
            self.name(),
            OperationKind::AutocompleteSearch,
        ))
    }

    /// Fetch a single page and extract its content
    async fn scrape_webpage(
        &self,
        ctx: &CallContext,
        params: &ScrapeParams,
    ) -> EngineResult<SearchResult>;
}
