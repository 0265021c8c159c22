use std::sync::Arc;

use http::Method;
use serde_json::{Map, Value};

use super::{find_header, HeaderVec, RangeSpec};
use crate::ids::RequestId;

/// An inbound HTTP request.
///
/// `context` is request-scoped storage shared between middleware, requirements
/// and directives (authenticators store the user under `"user"`, the session
/// middleware stores the session under `"session"`).
#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
    pub context: Map<String, Value>,
}

impl Request {
    /// Build a request from a method and a request target (`/path?query`).
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            headers: HeaderVec::new(),
            body: Vec::new(),
            context: Map::new(),
        }
    }

    #[must_use]
    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    #[must_use]
    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.with_header("Content-Type", content_type)
    }

    #[must_use]
    pub fn with_json(self, body: &Value) -> Self {
        self.with_body("application/json", body.to_string())
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Query parameters as a map; repeated keys collect into a list.
    #[must_use]
    pub fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        for (key, value) in &self.query {
            let value = Value::String(value.clone());
            match params.get_mut(key) {
                Some(Value::Array(existing)) => existing.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    params.insert(key.clone(), value);
                }
            }
        }
        params
    }

    /// Parsed cookies from the `Cookie` header.
    #[must_use]
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.header("cookie")
            .map(|raw| {
                raw.split(';')
                    .filter_map(|pair| {
                        let (name, value) = pair.trim().split_once('=')?;
                        Some((name.trim().to_string(), value.trim().to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The requested byte range, when a well-formed `Range` header is present.
    #[must_use]
    pub fn range(&self) -> Option<RangeSpec> {
        self.header("range").and_then(|raw| RangeSpec::parse(raw).ok())
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_parsing() {
        let request = Request::get("/happy_birthday?name=HUG&age=1&tag=a&tag=b%20c");
        assert_eq!(request.path, "/happy_birthday");
        assert_eq!(request.query_param("name"), Some("HUG"));
        let params = request.params();
        assert_eq!(params.get("age"), Some(&json!("1")));
        assert_eq!(params.get("tag"), Some(&json!(["a", "b c"])));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = Request::get("/").with_header("X-API-VERSION", "2");
        assert_eq!(request.header("x-api-version"), Some("2"));
        assert_eq!(request.header("missing"), None);
    }

    #[test]
    fn test_cookies() {
        let request = Request::get("/").with_header("Cookie", "sid=abc; theme=dark");
        assert_eq!(request.cookie("sid").as_deref(), Some("abc"));
        assert_eq!(request.cookies().len(), 2);
    }
}
