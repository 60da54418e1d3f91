//! Outbound request and response types

use std::collections::HashMap;

/// HTTP request to be made on behalf of an engine
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters, sent in insertion order
    pub params: Vec<(String, String)>,
    /// Request body
    pub data: Option<RequestBody>,
}

impl EngineRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Get)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::with_method(url, HttpMethod::Post)
    }

    fn with_method(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            params: Vec::new(),
            data: None,
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add JSON body
    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.data = Some(RequestBody::Json(data));
        self
    }

    /// Whether a header was set, case-insensitively
    pub fn has_header(&self, key: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(key))
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request body types
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
}

/// HTTP response from an engine request
#[derive(Debug)]
pub struct EngineResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, lowercase names
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
    /// Response URL (after redirects)
    pub url: String,
}

impl EngineResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.text)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response indicates rate limiting
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Whether the body is declared as HTML
    pub fn is_html(&self) -> bool {
        self.headers
            .get("content-type")
            .map(|ct| ct.contains("html"))
            .unwrap_or(true)
    }

    /// Leading part of the body, for error messages
    pub fn snippet(&self, max_chars: usize) -> String {
        let trimmed = self.text.trim();
        if trimmed.chars().count() <= max_chars {
            trimmed.to_string()
        } else {
            let mut cut: String = trimmed.chars().take(max_chars).collect();
            cut.push_str("...");
            cut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, text: &str) -> EngineResponse {
        EngineResponse {
            status,
            headers: HashMap::new(),
            text: text.to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_request_builder() {
        let request = EngineRequest::get("https://example.com")
            .param("q", "rust")
            .param("engine", "google")
            .header("X-API-KEY", "secret");

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.params[0], ("q".to_string(), "rust".to_string()));
        assert!(request.has_header("x-api-key"));
        assert!(!request.has_header("accept"));
    }

    #[test]
    fn test_response_status() {
        assert!(response(204, "").is_success());
        assert!(response(429, "").is_rate_limited());
        assert!(!response(500, "").is_success());
    }

    #[test]
    fn test_snippet_truncates() {
        let r = response(500, "  abcdef  ");
        assert_eq!(r.snippet(10), "abcdef");
        assert_eq!(r.snippet(3), "abc...");
    }
}
