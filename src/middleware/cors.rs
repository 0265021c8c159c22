use std::time::Duration;

use http::{Method, StatusCode};

use super::Middleware;
use crate::http::{Request, Response};

/// Cross-origin resource sharing for every route.
///
/// A request whose `Origin` is allowed gets the origin echoed back in
/// `Access-Control-Allow-Origin`. Preflight `OPTIONS` requests are answered
/// by the router as usual; the allowed methods come from the `allow` header
/// the router sets on them, falling back to the configured list.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    allow_origins: Vec<String>,
    allow_credentials: bool,
    allowed_methods: Vec<Method>,
    allowed_headers: Vec<String>,
    max_age: Option<u64>,
}

impl Default for CorsMiddleware {
    /// Any origin, credentials allowed, the common methods.
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".into()],
            allow_credentials: true,
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: Vec::new(),
            max_age: None,
        }
    }
}

impl CorsMiddleware {
    #[must_use]
    pub fn new(allow_origins: Vec<String>) -> Self {
        Self {
            allow_origins,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    #[must_use]
    pub fn allowed_methods(mut self, methods: Vec<Method>) -> Self {
        self.allowed_methods = methods;
        self
    }

    #[must_use]
    pub fn allowed_headers(mut self, headers: Vec<String>) -> Self {
        self.allowed_headers = headers;
        self
    }

    #[must_use]
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    fn allowed_origin<'a>(&self, origin: &'a str) -> Option<&'a str> {
        self.allow_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
            .then_some(origin)
    }
}

impl Middleware for CorsMiddleware {
    fn after(&self, req: &Request, res: &mut Response, _latency: Duration) {
        let Some(origin) = req.header("origin").and_then(|origin| self.allowed_origin(origin))
        else {
            return;
        };
        res.set_header("Access-Control-Allow-Origin", origin);
        res.set_header(
            "Access-Control-Allow-Credentials",
            if self.allow_credentials { "true" } else { "false" },
        );

        if req.method != Method::OPTIONS {
            return;
        }
        if res.status == StatusCode::METHOD_NOT_ALLOWED {
            res.status = StatusCode::NO_CONTENT;
        }
        let methods = match res.header("allow") {
            Some(allow) => allow.to_string(),
            None => self
                .allowed_methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        };
        res.set_header("Access-Control-Allow-Methods", methods);
        let headers = if self.allowed_headers.is_empty() {
            req.header("Access-Control-Request-Headers")
                .unwrap_or_default()
                .to_string()
        } else {
            self.allowed_headers.join(", ")
        };
        if !headers.is_empty() {
            res.set_header("Access-Control-Allow-Headers", headers);
        }
        if let Some(max_age) = self.max_age {
            res.set_header("Access-Control-Max-Age", max_age.to_string());
        }
    }
}
