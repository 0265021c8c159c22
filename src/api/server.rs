//! The materialised, dispatchable form of an [`Api`].

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::version::determine_version;
use super::{Api, MethodTable};
use crate::error::{kinds, Error};
use crate::http::{Body, Request, Response};

static VERSION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/v(\d+)(/.*)?$").expect("version prefix pattern is valid"));

enum Matcher {
    Literal(String),
    /// Compiled `{param}` template and its parameter names, in order.
    Template(Regex, Vec<String>),
}

struct CompiledRoute {
    matcher: Matcher,
    methods: MethodTable,
}

impl CompiledRoute {
    fn matches(&self, path: &str) -> Option<Map<String, Value>> {
        match &self.matcher {
            Matcher::Literal(url) => (url == path).then(Map::new),
            Matcher::Template(regex, names) => {
                let captures = regex.captures(path)?;
                let mut values = Map::new();
                for (index, name) in names.iter().enumerate() {
                    if let Some(value) = captures.get(index + 1) {
                        let decoded = urlencoding::decode(value.as_str())
                            .map_or_else(|_| value.as_str().to_string(), |decoded| decoded.into_owned());
                        values.insert(name.clone(), Value::String(decoded));
                    }
                }
                Some(values)
            }
        }
    }
}

/// The path below `base_url`, or `None` when the request is outside it.
fn strip_base_url(path: &str, base_url: &str) -> Option<String> {
    match path.strip_prefix(base_url)? {
        "" => Some("/".to_string()),
        rest if base_url.is_empty() || rest.starts_with('/') => Some(rest.to_string()),
        _ => None,
    }
}

/// Strip a `/v{N}` prefix, returning the remaining path and `N`.
fn split_version(path: String) -> (String, Option<u32>) {
    let split = VERSION_PREFIX.captures(&path).and_then(|captures| {
        let version = captures.get(1)?.as_str().parse::<u32>().ok()?;
        let rest = captures
            .get(2)
            .map_or_else(|| "/".to_string(), |rest| rest.as_str().to_string());
        Some((rest, version))
    });
    match split {
        Some((rest, version)) => (rest, Some(version)),
        None => (path, None),
    }
}

/// Turn `/users/{id}/posts/{post}` into an anchored regex and the ordered
/// parameter names. Literal segments are escaped.
fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    let mut names = Vec::with_capacity(path.matches('{').count());
    for segment in path.split('/').skip(1) {
        pattern.push('/');
        if let Some(name) = segment.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            pattern.push_str("([^/]+)");
            names.push(name.to_string());
        } else {
            pattern.push_str(&regex::escape(segment));
        }
    }
    pattern.push('$');
    Ok((Regex::new(&pattern)?, names))
}

/// Serves requests against a frozen [`Api`].
///
/// Request flow: middleware `before` hooks in registration order, base URL
/// and `/v{N}` prefix stripping, version resolution, route match (method,
/// then exact version, then unversioned), sinks, not-found; then middleware
/// `after` hooks in registration order.
pub struct ApiServer {
    api: Arc<Api>,
    routes: Vec<CompiledRoute>,
}

impl ApiServer {
    pub(super) fn new(api: Arc<Api>) -> Result<Self, Error> {
        let mut routes = Vec::new();
        for (url, methods) in api.http.routes() {
            let matcher = if url.contains('{') {
                let (regex, names) = path_to_regex(url).map_err(|source| Error::InvalidRoute {
                    url: url.to_string(),
                    source,
                })?;
                Matcher::Template(regex, names)
            } else {
                Matcher::Literal(url.to_string())
            };
            routes.push(CompiledRoute {
                matcher,
                methods: methods.clone(),
            });
        }
        debug!(api = api.name(), routes = routes.len(), "server materialised");
        Ok(Self { api, routes })
    }

    #[must_use]
    pub fn api(&self) -> &Api {
        &self.api
    }

    /// Shared handle to the API, for hosts that serve from several threads.
    #[must_use]
    pub fn api_handle(&self) -> Arc<Api> {
        Arc::clone(&self.api)
    }

    /// Serve one request.
    ///
    /// Application errors carrying an HTTP status (authentication failures,
    /// redirects, bad requests) that no exception handler claimed are
    /// rendered as that status.
    ///
    /// # Errors
    ///
    /// Conflicting or malformed version signals, directive failures and
    /// application errors without a status that nothing handled.
    pub fn handle(&self, mut request: Request) -> Result<Response, Error> {
        self.api.start();
        let started = Instant::now();
        let middleware = self.api.http.middleware();

        let mut response = match middleware.iter().find_map(|layer| layer.before(&mut request)) {
            Some(response) => response,
            None => {
                let mut response = Response::new();
                match self.dispatch(&mut request, &mut response) {
                    Ok(()) => {}
                    Err(Error::Unhandled(err)) if err.status().is_some() => {
                        response = render_status_error(&err);
                    }
                    Err(err) => return Err(err),
                }
                response
            }
        };

        let latency = started.elapsed();
        for layer in middleware {
            layer.after(&request, &mut response, latency);
        }
        Ok(response)
    }

    fn dispatch(&self, request: &mut Request, response: &mut Response) -> Result<(), Error> {
        let api = &*self.api;
        let base_url = api.http.base_url();
        let Some(path) = strip_base_url(&request.path, base_url) else {
            return api.not_found(request, response, None);
        };
        let (path, from_path) = if api.http.is_versioned() {
            split_version(path)
        } else {
            (path, None)
        };

        let version = determine_version(
            request,
            from_path,
            api.http.version_header(),
            api.http.version_param(),
        )?;

        for route in &self.routes {
            let Some(extra) = route.matches(&path) else {
                continue;
            };
            if !route.methods.methods().any(|method| *method == request.method) {
                let allow: Vec<&str> = route.methods.methods().map(http::Method::as_str).collect();
                debug!(path = %path, method = %request.method, allow = ?allow, "method not allowed");
                response.status = StatusCode::METHOD_NOT_ALLOWED;
                response.set_header("allow", allow.join(", "));
                response.body = Body::Empty;
                return Ok(());
            }
            return match route.methods.lookup(&request.method, version) {
                Some(interface) => {
                    debug!(path = %path, version = ?version, function = interface.name(), "route matched");
                    interface.call(api, request, response, version, extra)
                }
                None => api.not_found(request, response, version),
            };
        }

        if let Some(sink) = api.http.sink(&path, version) {
            debug!(path = %path, function = sink.name(), "serving from sink");
            return sink.call(api, request, response, version, Map::new());
        }
        api.not_found(request, response, version)
    }
}

/// Render an unclaimed status-carrying error: redirects keep an empty body,
/// everything else gets `{"errors": {title: description}}`.
fn render_status_error(err: &crate::error::ApiError) -> Response {
    let mut response = Response::new();
    response.status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    for (name, value) in err.headers() {
        response.set_header(name, value.clone());
    }
    if err.kind().is_a(&kinds::REDIRECT) {
        response.body = Body::Empty;
        return response;
    }
    match serde_json::to_vec(&err.to_body()) {
        Ok(bytes) => {
            response.content_type = Some("application/json; charset=utf-8".to_string());
            response.body = Body::Bytes(bytes);
        }
        Err(serialize) => warn!(error = %serialize, "failed to serialize error body"),
    }
    response
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer")
            .field("api", &self.api.name())
            .field("routes", &self.routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_regex() {
        let (regex, names) = path_to_regex("/users/{id}/posts/{post}").unwrap();
        assert_eq!(names, ["id", "post"]);
        let captures = regex.captures("/users/7/posts/abc").unwrap();
        assert_eq!(&captures[1], "7");
        assert_eq!(&captures[2], "abc");
        assert!(!regex.is_match("/users/7/posts"));

        let (literal, _) = path_to_regex("/files.json/{name}").unwrap();
        assert!(literal.is_match("/files.json/a"));
        assert!(!literal.is_match("/filesxjson/a"));
    }

    #[test]
    fn test_strip_base_url() {
        assert_eq!(strip_base_url("/api/echo", "/api"), Some("/echo".to_string()));
        assert_eq!(strip_base_url("/api", "/api"), Some("/".to_string()));
        assert_eq!(strip_base_url("/apix", "/api"), None);
        assert_eq!(strip_base_url("/echo", ""), Some("/echo".to_string()));
    }

    #[test]
    fn test_split_version() {
        assert_eq!(split_version("/v3/echo".to_string()), ("/echo".to_string(), Some(3)));
        assert_eq!(split_version("/v2".to_string()), ("/".to_string(), Some(2)));
        assert_eq!(split_version("/vendor".to_string()), ("/vendor".to_string(), None));
    }

    #[test]
    fn test_template_captures_are_decoded() {
        let (regex, names) = path_to_regex("/greet/{name}").unwrap();
        let route = CompiledRoute {
            matcher: Matcher::Template(regex, names),
            methods: MethodTable::default(),
        };
        let values = route.matches("/greet/ada%20l").unwrap();
        assert_eq!(values.get("name"), Some(&Value::from("ada l")));
        assert!(route.matches("/other/x").is_none());
    }
}
