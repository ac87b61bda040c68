//! Request collaborator contract.
//!
//! The form never touches the HTTP layer directly. It asks the request for
//! its method, submitted fields, content negotiation and URL, and delegates
//! validation to it. [`InboundRequest`] is a plain value implementing the
//! contract; the axum adapter builds one from each incoming request.

use axum::http::{HeaderMap, Method};
use serde_json::{Map, Value};
use url::Url;

use crate::validation::{self, Messages, RuleSet, ValidationErrors};

/// What the form needs from an incoming request
pub trait FormRequest: Send + Sync {
    fn method(&self) -> &Method;

    /// All submitted fields, query string and body merged
    fn all_input(&self) -> &Map<String, Value>;

    /// Whether the client asked for a JSON answer
    fn wants_json(&self) -> bool;

    /// Full URL of the request including its query string
    fn full_url(&self) -> String;

    /// URL of the page the request came from
    fn referer(&self) -> Option<&str>;

    fn input(&self, key: &str) -> Option<&Value> {
        self.all_input().get(key)
    }

    fn input_or(&self, key: &str, default: Value) -> Value {
        self.input(key).cloned().unwrap_or(default)
    }

    /// Present and not blank
    fn filled(&self, key: &str) -> bool {
        self.input(key).is_some_and(|v| !validation::is_blank(v))
    }

    /// Truthy flag such as `reset=1`
    fn boolean(&self, key: &str) -> bool {
        self.input(key).is_some_and(validation::is_truthy)
    }

    fn is_method(&self, method: &Method) -> bool {
        self.method() == method
    }

    /// The request URL with the given query parameters replaced or added
    fn full_url_with_query(&self, overrides: &[(&str, String)]) -> String {
        let full = self.full_url();
        let Ok(mut url) = Url::parse(&full) else {
            return full;
        };

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !overrides.iter().any(|(o, _)| o == k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.extend(overrides.iter().map(|(k, v)| ((*k).to_string(), v.clone())));

        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }

    /// Where a "redirect back" should go
    fn previous_url(&self) -> String {
        self.referer()
            .map(str::to_string)
            .unwrap_or_else(|| self.full_url())
    }

    /// Validate the submitted fields, returning only the validated ones
    fn validate(
        &self,
        rules: &RuleSet,
        messages: &Messages,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        validation::validate(self.all_input(), rules, messages)
    }
}

/// A request captured as plain data
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    url: String,
    input: Map<String, Value>,
    wants_json: bool,
    referer: Option<String>,
}

impl InboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            input: Map::new(),
            wants_json: false,
            referer: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add one submitted field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    /// Merge submitted fields; later values win
    pub fn fields(mut self, fields: Map<String, Value>) -> Self {
        self.input.extend(fields);
        self
    }

    pub fn json(mut self) -> Self {
        self.wants_json = true;
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Build from HTTP parts.
    ///
    /// Query string fields are merged first, body fields override them.
    pub fn from_parts(
        method: Method,
        url: impl Into<String>,
        headers: &HeaderMap,
        query: Map<String, Value>,
        body: Map<String, Value>,
    ) -> Self {
        let mut input = query;
        input.extend(body);

        let referer = headers
            .get(axum::http::header::REFERER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            method,
            url: url.into(),
            input,
            wants_json: wants_json(headers),
            referer,
        }
    }
}

impl FormRequest for InboundRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn all_input(&self) -> &Map<String, Value> {
        &self.input
    }

    fn wants_json(&self) -> bool {
        self.wants_json
    }

    fn full_url(&self) -> String {
        self.url.clone()
    }

    fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }
}

/// JSON body, a JSON-first `Accept` header, or an XHR marker
pub fn wants_json(headers: &HeaderMap) -> bool {
    let header = |name: axum::http::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase()
    };

    let is_json_type = |value: &str| value.contains("/json") || value.contains("+json");

    let content_type = header(axum::http::header::CONTENT_TYPE);
    let accept = header(axum::http::header::ACCEPT);
    let first_accept = accept.split(',').next().unwrap_or_default().trim();
    let xhr = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

    is_json_type(&content_type) || is_json_type(first_accept) || xhr
}
