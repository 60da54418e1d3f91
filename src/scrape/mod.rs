//! Webpage fetching and structural extraction
//!
//! Used by engines whose provider has no hosted scrape endpoint.

use crate::engines::{CallContext, EngineError, EngineResult, ScrapeParams, SearchResult};
use crate::network::{accept_html, EngineRequest, HttpClient};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    selector(r#"meta[name="description"], meta[property="og:description"]"#)
});
static HEADINGS: Lazy<Selector> = Lazy::new(|| selector("h1, h2, h3"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("body"));
static LINKS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Elements whose text is never shown to a reader
const HIDDEN_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// Extracted content of a page
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageContent {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub headings: Vec<Heading>,
    pub text: String,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// Fetches pages and extracts their readable content
#[derive(Clone)]
pub struct PageScraper {
    client: HttpClient,
    max_text_chars: usize,
    max_links: usize,
}

impl PageScraper {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            max_text_chars: 50_000,
            max_links: 200,
        }
    }

    pub fn with_limits(mut self, max_text_chars: usize, max_links: usize) -> Self {
        self.max_text_chars = max_text_chars;
        self.max_links = max_links;
        self
    }

    /// Fetch a page and return its content as the result data
    pub async fn scrape(
        &self,
        ctx: &CallContext,
        params: &ScrapeParams,
        engine: &str,
        version: &str,
    ) -> EngineResult<SearchResult> {
        let request = EngineRequest::get(params.url()).header("Accept", accept_html());
        let response = ctx
            .run(async {
                self.client
                    .execute(request)
                    .await
                    .map_err(|e| EngineError::upstream(engine, None, e.to_string()))
            })
            .await?;

        if !response.is_success() {
            return Err(EngineError::upstream(
                engine,
                Some(response.status),
                format!("HTTP {} fetching {}", response.status, params.url()),
            ));
        }
        if !response.is_html() {
            return Err(EngineError::upstream(
                engine,
                Some(response.status),
                format!("{} is not an HTML page", response.url),
            ));
        }

        let base = Url::parse(&response.url)
            .or_else(|_| Url::parse(params.url()))
            .map_err(|e| EngineError::invalid_params(e.to_string()))?;
        let content = self.extract(&response.text, &base);

        let data = serde_json::to_value(content)
            .map_err(|e| EngineError::upstream(engine, None, e.to_string()))?;
        SearchResult::new(data, engine, version)
    }

    /// Extract title, description, headings, visible text and links
    pub fn extract(&self, html: &str, base: &Url) -> PageContent {
        let document = Html::parse_document(html);

        let title = document
            .select(&TITLE)
            .next()
            .map(|t| collapse(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty());

        let description = document
            .select(&META_DESCRIPTION)
            .filter_map(|m| m.value().attr("content"))
            .map(collapse)
            .find(|d| !d.is_empty());

        let headings = document
            .select(&HEADINGS)
            .filter_map(|h| {
                let level = h.value().name()[1..].parse().ok()?;
                let text = collapse(&h.text().collect::<String>());
                (!text.is_empty()).then_some(Heading { level, text })
            })
            .collect();

        let mut text = document
            .select(&BODY)
            .next()
            .map(visible_text)
            .unwrap_or_default();
        if text.chars().count() > self.max_text_chars {
            text = text.chars().take(self.max_text_chars).collect();
        }

        let mut seen = HashSet::new();
        let links = document
            .select(&LINKS)
            .filter_map(|a| {
                let href = base.join(a.value().attr("href")?).ok()?;
                if !matches!(href.scheme(), "http" | "https") {
                    return None;
                }
                let href = href.to_string();
                seen.insert(href.clone()).then(|| Link {
                    text: collapse(&a.text().collect::<String>()),
                    href,
                })
            })
            .take(self.max_links)
            .collect();

        PageContent {
            url: base.to_string(),
            title,
            description,
            headings,
            text,
            links,
        }
    }
}

fn visible_text(root: ElementRef) -> String {
    let mut pieces = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden && !text.trim().is_empty() {
            pieces.push(text.trim());
        }
    }
    collapse(&pieces.join(" "))
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!doctype html>
<html>
  <head>
    <title>  Ferris   Facts </title>
    <meta name="description" content="All about the crab">
    <style>body { color: red; }</style>
  </head>
  <body>
    <h1>Ferris</h1>
    <p>Ferris is the   unofficial mascot.</p>
    <script>var hidden = "do not index";</script>
    <h2>Links</h2>
    <a href="/about">About</a>
    <a href="https://www.rust-lang.org/">Rust</a>
    <a href="/about">About again</a>
    <a href="mailto:crab@example.com">Mail</a>
  </body>
</html>"#;

    fn scraper() -> PageScraper {
        PageScraper::new(HttpClient::new().unwrap())
    }

    #[test]
    fn test_extract() {
        let base = Url::parse("https://example.com/ferris").unwrap();
        let content = scraper().extract(PAGE, &base);

        assert_eq!(content.title.as_deref(), Some("Ferris Facts"));
        assert_eq!(content.description.as_deref(), Some("All about the crab"));
        assert_eq!(
            content.headings,
            vec![
                Heading { level: 1, text: "Ferris".into() },
                Heading { level: 2, text: "Links".into() },
            ]
        );
        assert!(content.text.contains("Ferris is the unofficial mascot."));
        assert!(!content.text.contains("do not index"));
        assert!(!content.text.contains("color: red"));

        let hrefs: Vec<_> = content.links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["https://example.com/about", "https://www.rust-lang.org/"]
        );
    }

    #[test]
    fn test_text_limit() {
        let base = Url::parse("https://example.com").unwrap();
        let content = scraper().with_limits(6, 1).extract(PAGE, &base);
        assert_eq!(content.text, "Ferris");
        assert_eq!(content.links.len(), 1);
    }

    #[tokio::test]
    async fn test_scrape_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ferris"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(PAGE, "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let params = ScrapeParams::new(&format!("{}/ferris", server.uri())).unwrap();
        let result = scraper()
            .scrape(&CallContext::new(), &params, "serpapi", "1.0")
            .await
            .unwrap();

        assert_eq!(result.data()["title"], "Ferris Facts");
        assert_eq!(result.source_engine(), "serpapi");
    }

    #[tokio::test]
    async fn test_scrape_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let params = ScrapeParams::new(&format!("{}/missing", server.uri())).unwrap();
        let err = scraper()
            .scrape(&CallContext::new(), &params, "serpapi", "1.0")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Upstream { status: Some(404), .. }));
    }
}
