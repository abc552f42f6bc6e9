//! Per-request context handed to route handlers.
//!
//! A [`Context`] owns the parsed [`Request`] and accumulates what the pipeline
//! learns about it: the path parameters captured by the router, the parsed
//! query string, and the JSON body decoded by
//! [`JsonMiddleware`](crate::middleware::JsonMiddleware).

use std::collections::HashMap;

use serde_json::Value;

use crate::Request;

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Query-string parameters, decoded from the raw query captured by the router.
///
/// # Examples
///
/// ```
/// use users_api::context::QueryParams;
///
/// let query = QueryParams::parse("search=john+doe&page=2&flag");
/// assert_eq!(query.get("search"), Some("john doe"));
/// assert_eq!(query.get("page"), Some("2"));
/// assert_eq!(query.get("flag"), Some(""));
/// assert_eq!(query.get("missing"), None);
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    map: HashMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value&key2=value2`.
    ///
    /// Only the first `=` of a pair separates key from value; a pair without
    /// `=` maps to the empty string. `+` decodes to a space and `%XX` escapes
    /// are percent-decoded. Empty pairs are skipped and a repeated key keeps
    /// its last value.
    pub fn parse(raw: &str) -> Self {
        let map = raw
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect();
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// Malformed escapes are kept verbatim rather than rejected.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Per-request state: the request itself plus everything derived from it.
pub struct Context {
    request: Request,
    params: PathParams,
    query: QueryParams,
    body: Option<Value>,
}

impl Context {
    /// Create a new context from a request
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: PathParams::new(),
            query: QueryParams::new(),
            body: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// The JSON body, when a middleware has decoded one.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Record the router's captures and parse its raw query, if any.
    pub(crate) fn set_route(&mut self, params: PathParams, raw_query: Option<&str>) {
        self.params = params;
        self.query = raw_query.map(QueryParams::parse).unwrap_or_default();
    }

    pub(crate) fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    /// Deserialize the request body into `T`.
    ///
    /// Uses the already-decoded JSON body when present and falls back to the
    /// raw bytes otherwise.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        match &self.body {
            Some(value) => T::deserialize(value),
            None => serde_json::from_slice(self.request.body()),
        }
    }
}
