//! # Routes
//!
//! A [`RouteSpec`] is an immutable record of route options. Routers wrap a
//! spec and add kind-specific builders; every builder returns a new router
//! and leaves the original untouched, so a partially configured router can
//! be shared and specialised:
//!
//! ```rust
//! use hugroute::route::{self, Router};
//!
//! let base = route::http().versions(1);
//! let read = base.get();
//! let write = base.post();
//! assert!(base.spec().accept.is_none());
//! assert_eq!(read.spec().accept.as_ref().map(Vec::len), Some(1));
//! assert_eq!(write.spec().versions, Some(vec![Some(1)]));
//! ```
//!
//! Applying a router to an [`Endpoint`] with [`Router::route`] builds the
//! interface once and registers it with the [`Api`].

use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::api::Api;
use crate::error::ErrorKind;
use crate::format::input::InputFormatRef;
use crate::format::output::OutputFormatRef;
use crate::interface::{
    requirement, CliInterface, Conclusion, Endpoint, HttpInterface, InterfaceRole, LocalInterface,
    Override, Requirement,
};
use crate::introspect::Annotation;
use crate::transform::Transform;
use crate::validate::ValidateFn;

/// Every HTTP method a route accepts by default.
#[must_use]
pub fn all_methods() -> Vec<Method> {
    vec![
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::HEAD,
        Method::OPTIONS,
        Method::CONNECT,
        Method::TRACE,
    ]
}

/// Route options. `None` (or [`Override::Inherit`]) means "not set": the
/// interface falls back to what the endpoint's signature or the API provides.
#[derive(Clone, Default)]
pub struct RouteSpec {
    pub urls: Option<Vec<String>>,
    pub accept: Option<Vec<Method>>,
    /// `None` entries register the unversioned route.
    pub versions: Option<Vec<Option<u32>>>,
    pub examples: Option<Vec<String>>,
    pub suffixes: Option<Vec<String>>,
    pub prefixes: Option<Vec<String>>,
    pub output: Option<OutputFormatRef>,
    pub output_invalid: Option<OutputFormatRef>,
    /// Route-level input formats keyed by mime type; checked before the API's.
    pub inputs: Option<Vec<(String, InputFormatRef)>>,
    pub transform: Override<Transform>,
    pub on_invalid: Override<Transform>,
    pub validate: Option<ValidateFn>,
    pub requires: Option<Vec<Requirement>>,
    pub parameters: Option<Vec<String>>,
    pub defaults: Option<Map<String, Value>>,
    pub args: Option<Vec<(String, Annotation)>>,
    pub map_params: Option<Vec<(String, String)>>,
    pub status: Option<StatusCode>,
    pub response_headers: Option<Vec<(String, String)>>,
    pub parse_body: Option<bool>,
    pub raise_on_invalid: Option<bool>,
    pub private: Option<bool>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub doc: Option<String>,
    pub skip_directives: Option<bool>,
    pub skip_validation: Option<bool>,
    pub prefix: Option<String>,
    pub exceptions: Option<Vec<&'static ErrorKind>>,
    pub exclude: Option<Vec<&'static ErrorKind>>,
}

macro_rules! overlay {
    ($base:ident, $overrides:ident; $($field:ident),* $(,)?) => {
        RouteSpec {
            transform: $overrides.transform.or(&$base.transform),
            on_invalid: $overrides.on_invalid.or(&$base.on_invalid),
            $($field: $overrides.$field.clone().or_else(|| $base.$field.clone()),)*
        }
    };
}

macro_rules! set_options {
    ($spec:ident, $names:ident; $($field:ident),* $(,)?) => {
        $(
            if $spec.$field.is_some() {
                $names.push(stringify!($field));
            }
        )*
    };
}

impl RouteSpec {
    /// A copy of `self` with every option set in `overrides` replaced.
    #[must_use]
    pub fn with(&self, overrides: &RouteSpec) -> RouteSpec {
        overlay!(self, overrides;
            urls, accept, versions, examples, suffixes, prefixes, output, output_invalid,
            inputs, validate, requires, parameters, defaults, args, map_params, status,
            response_headers, parse_body, raise_on_invalid, private, name, version, doc,
            skip_directives, skip_validation, prefix, exceptions, exclude,
        )
    }

    /// Names of the options that are set, in declaration order.
    #[must_use]
    pub fn options(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        set_options!(self, names;
            urls, accept, versions, examples, suffixes, prefixes, output, output_invalid, inputs);
        if self.transform.is_set() {
            names.push("transform");
        }
        if self.on_invalid.is_set() {
            names.push("on_invalid");
        }
        set_options!(self, names;
            validate, requires, parameters, defaults, args, map_params, status, response_headers,
            parse_body, raise_on_invalid, private, name, version, doc, skip_directives,
            skip_validation, prefix, exceptions, exclude);
        names
    }

    /// Declared versions, or the unversioned route alone.
    #[must_use]
    pub fn versions_or_default(&self) -> Vec<Option<u32>> {
        match &self.versions {
            Some(versions) if !versions.is_empty() => versions.clone(),
            _ => vec![None],
        }
    }

    /// Every path the route is exposed under: each base URL, then each base
    /// with every suffix, then every prefix with each base.
    #[must_use]
    pub fn expanded_urls(&self, endpoint: &Endpoint) -> Vec<String> {
        let bases = self
            .urls
            .clone()
            .unwrap_or_else(|| vec![format!("/{}", endpoint.name())]);
        let mut expose = Vec::new();
        for base in &bases {
            expose.push(base.clone());
            for suffix in self.suffixes.iter().flatten() {
                match suffix.strip_prefix('/') {
                    Some(segment) => expose.push(format!("{}/{segment}", base.trim_end_matches('/'))),
                    None => expose.push(format!("{base}{suffix}")),
                }
            }
            for prefix in self.prefixes.iter().flatten() {
                expose.push(format!("{prefix}{base}"));
            }
        }
        expose
    }
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("options", &self.options())
            .field("urls", &self.urls)
            .field("accept", &self.accept)
            .field("versions", &self.versions)
            .finish_non_exhaustive()
    }
}

/// Anything usable as a route's version set.
pub trait IntoVersions {
    fn into_versions(self) -> Vec<Option<u32>>;
}

impl IntoVersions for u32 {
    fn into_versions(self) -> Vec<Option<u32>> {
        vec![Some(self)]
    }
}

impl IntoVersions for Option<u32> {
    fn into_versions(self) -> Vec<Option<u32>> {
        vec![self]
    }
}

impl IntoVersions for Vec<u32> {
    fn into_versions(self) -> Vec<Option<u32>> {
        self.into_iter().map(Some).collect()
    }
}

impl IntoVersions for Vec<Option<u32>> {
    fn into_versions(self) -> Vec<Option<u32>> {
        self
    }
}

impl<const N: usize> IntoVersions for [u32; N] {
    fn into_versions(self) -> Vec<Option<u32>> {
        self.into_iter().map(Some).collect()
    }
}

impl IntoVersions for Range<u32> {
    fn into_versions(self) -> Vec<Option<u32>> {
        self.map(Some).collect()
    }
}

impl IntoVersions for RangeInclusive<u32> {
    fn into_versions(self) -> Vec<Option<u32>> {
        self.map(Some).collect()
    }
}

/// Builder behaviour shared by every router kind.
pub trait Router: Sized {
    /// What routing an endpoint produces.
    type Interface;

    fn spec(&self) -> &RouteSpec;

    fn from_spec(spec: RouteSpec) -> Self;

    /// Build the interface for `endpoint` and register it with `api`.
    fn route(&self, api: &mut Api, endpoint: &Endpoint) -> Arc<Self::Interface>;

    /// Copy-and-override: a new router whose spec is `self`'s with every
    /// option set in `overrides` replaced.
    #[must_use]
    fn with(&self, overrides: &RouteSpec) -> Self {
        Self::from_spec(self.spec().with(overrides))
    }

    /// A new router with `change` applied to a copy of its `RouteSpec`.
    #[must_use]
    fn configure(&self, change: impl FnOnce(&mut RouteSpec)) -> Self {
        let mut spec = self.spec().clone();
        change(&mut spec);
        Self::from_spec(spec)
    }

    #[must_use]
    fn output(&self, format: OutputFormatRef) -> Self {
        self.configure(|spec| spec.output = Some(format))
    }

    #[must_use]
    fn transform(&self, transform: Transform) -> Self {
        self.configure(|spec| spec.transform = Override::Use(transform))
    }

    /// Switch off the return-type transform the endpoint declares.
    #[must_use]
    fn no_transform(&self) -> Self {
        self.configure(|spec| spec.transform = Override::Disable)
    }

    /// Reshape `{"errors": ...}`; defaults to the transform.
    #[must_use]
    fn on_invalid(&self, transform: Transform) -> Self {
        self.configure(|spec| spec.on_invalid = Override::Use(transform))
    }

    #[must_use]
    fn output_invalid(&self, format: OutputFormatRef) -> Self {
        self.configure(|spec| spec.output_invalid = Some(format))
    }

    #[must_use]
    fn validate(&self, validate: ValidateFn) -> Self {
        self.configure(|spec| spec.validate = Some(validate))
    }

    /// Append requirements; earlier requirements run first.
    #[must_use]
    fn requires(&self, requirements: impl IntoIterator<Item = Requirement>) -> Self {
        self.configure(|spec| {
            spec.requires
                .get_or_insert_with(Vec::new)
                .extend(requirements);
        })
    }

    /// Replace the introspected parameter list.
    #[must_use]
    fn parameters(&self, parameters: &[&str]) -> Self {
        let parameters = parameters.iter().map(|name| (*name).to_string()).collect();
        self.configure(|spec| spec.parameters = Some(parameters))
    }

    #[must_use]
    fn defaults(&self, defaults: Map<String, Value>) -> Self {
        self.configure(|spec| spec.defaults = Some(defaults))
    }

    /// Annotate (or re-annotate) a parameter at the route.
    #[must_use]
    fn arg(&self, name: &str, annotation: Annotation) -> Self {
        self.configure(|spec| {
            let args = spec.args.get_or_insert_with(Vec::new);
            args.retain(|(existing, _)| existing != name);
            args.push((name.to_string(), annotation));
        })
    }

    /// Accept `external` from the caller as the parameter `internal`.
    #[must_use]
    fn map_param(&self, external: &str, internal: &str) -> Self {
        self.configure(|spec| {
            spec.map_params
                .get_or_insert_with(Vec::new)
                .push((external.to_string(), internal.to_string()));
        })
    }

    #[must_use]
    fn raise_on_invalid(&self, raise: bool) -> Self {
        self.configure(|spec| spec.raise_on_invalid = Some(raise))
    }

    #[must_use]
    fn versions(&self, versions: impl IntoVersions) -> Self {
        let versions = versions.into_versions();
        self.configure(|spec| spec.versions = Some(versions))
    }

    #[must_use]
    fn doc(&self, doc: &str) -> Self {
        self.configure(|spec| spec.doc = Some(doc.to_string()))
    }
}

/// Options every HTTP-facing router understands.
pub trait HttpOptions: Router {
    #[must_use]
    fn status(&self, status: StatusCode) -> Self {
        self.configure(|spec| spec.status = Some(status))
    }

    #[must_use]
    fn parse_body(&self, parse: bool) -> Self {
        self.configure(|spec| spec.parse_body = Some(parse))
    }

    /// Decode request bodies of `content_type` with `format`.
    #[must_use]
    fn input(&self, content_type: &str, format: InputFormatRef) -> Self {
        self.configure(|spec| {
            spec.inputs
                .get_or_insert_with(Vec::new)
                .push((content_type.to_ascii_lowercase(), format));
        })
    }

    /// Replace the response headers.
    #[must_use]
    fn response_headers(&self, headers: &[(&str, &str)]) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        self.configure(|spec| spec.response_headers = Some(headers))
    }

    /// Add response headers, replacing any of the same name.
    #[must_use]
    fn add_response_headers(&self, headers: &[(&str, &str)]) -> Self {
        self.configure(|spec| {
            let existing = spec.response_headers.get_or_insert_with(Vec::new);
            for (name, value) in headers {
                existing.retain(|(current, _)| !current.eq_ignore_ascii_case(name));
                existing.push(((*name).to_string(), (*value).to_string()));
            }
        })
    }

    /// Add a `cache-control` header.
    #[must_use]
    fn cache(&self, max_age: u64, private: bool) -> Self {
        let scope = if private { "private" } else { "public" };
        let value = format!("{scope}, max-age={max_age}");
        self.add_response_headers(&[("cache-control", value.as_str())])
    }

    /// Allow cross-origin requests from `origins` (all when empty). With more
    /// than one origin, the request's `Origin` is echoed back when it is one
    /// of them.
    #[must_use]
    fn allow_origins(&self, origins: &[&str], cors: CorsOptions) -> Self {
        let mut headers: Vec<(&str, String)> = Vec::new();
        match origins {
            [] => headers.push(("Access-Control-Allow-Origin", "*".to_string())),
            [origin] => headers.push(("Access-Control-Allow-Origin", (*origin).to_string())),
            _ => {}
        }
        if !cors.methods.is_empty() {
            let methods: Vec<&str> = cors.methods.iter().map(Method::as_str).collect();
            headers.push(("Access-Control-Allow-Methods", methods.join(", ")));
        }
        if cors.credentials {
            headers.push(("Access-Control-Allow-Credentials", "true".to_string()));
        }
        if !cors.headers.is_empty() {
            headers.push(("Access-Control-Allow-Headers", cors.headers.join(", ")));
        }
        if let Some(max_age) = cors.max_age {
            headers.push(("Access-Control-Max-Age", max_age.to_string()));
        }
        let borrowed: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        let router = self.add_response_headers(&borrowed);
        if origins.len() < 2 {
            return router;
        }
        let allowed: Vec<String> = origins.iter().map(|origin| (*origin).to_string()).collect();
        router.requires([requirement(move |ctx| {
            let origin = ctx
                .request
                .as_deref()
                .and_then(|request| request.header("origin"))
                .filter(|origin| allowed.iter().any(|allowed| allowed == origin))
                .map(str::to_string);
            if let (Some(origin), Some(response)) = (origin, ctx.response.as_deref_mut()) {
                response.set_header("Access-Control-Allow-Origin", origin);
            }
            Ok(Conclusion::Pass)
        })])
    }
}

/// Extra CORS headers for [`HttpOptions::allow_origins`].
#[derive(Debug, Clone, Default)]
pub struct CorsOptions {
    pub methods: Vec<Method>,
    pub credentials: bool,
    pub headers: Vec<String>,
    pub max_age: Option<u64>,
}

macro_rules! router {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default)]
        pub struct $name {
            spec: RouteSpec,
        }
    };
}

router!(
    /// Routes a function to URLs and methods.
    HttpRouter
);
router!(
    /// Routes every path beneath a prefix to a function.
    SinkRouter
);
router!(
    /// Routes unmatched requests to a function.
    NotFoundRouter
);
router!(
    /// Routes application errors of given kinds to a function.
    ExceptionRouter
);
router!(
    /// Exposes a function as a command.
    CliRouter
);
router!(
    /// Exposes a function for direct calls.
    LocalRouter
);

impl HttpRouter {
    /// Set the base URLs (default `/<name>`).
    #[must_use]
    pub fn urls(&self, urls: &[&str]) -> Self {
        let urls = urls.iter().map(|url| (*url).to_string()).collect();
        self.configure(|spec| spec.urls = Some(urls))
    }

    #[must_use]
    pub fn accept(&self, methods: &[Method]) -> Self {
        let methods = methods.to_vec();
        self.configure(|spec| spec.accept = Some(methods))
    }

    #[must_use]
    pub fn get(&self) -> Self {
        self.accept(&[Method::GET])
    }

    #[must_use]
    pub fn post(&self) -> Self {
        self.accept(&[Method::POST])
    }

    #[must_use]
    pub fn put(&self) -> Self {
        self.accept(&[Method::PUT])
    }

    #[must_use]
    pub fn delete(&self) -> Self {
        self.accept(&[Method::DELETE])
    }

    #[must_use]
    pub fn patch(&self) -> Self {
        self.accept(&[Method::PATCH])
    }

    #[must_use]
    pub fn options(&self) -> Self {
        self.accept(&[Method::OPTIONS])
    }

    #[must_use]
    pub fn head(&self) -> Self {
        self.accept(&[Method::HEAD])
    }

    #[must_use]
    pub fn connect(&self) -> Self {
        self.accept(&[Method::CONNECT])
    }

    #[must_use]
    pub fn trace(&self) -> Self {
        self.accept(&[Method::TRACE])
    }

    /// Accept every method.
    #[must_use]
    pub fn call(&self) -> Self {
        self.accept(&all_methods())
    }

    #[must_use]
    pub fn examples(&self, examples: &[&str]) -> Self {
        let examples = examples.iter().map(|example| (*example).to_string()).collect();
        self.configure(|spec| spec.examples = Some(examples))
    }

    /// Also expose the route under each base URL plus `suffixes`; a suffix
    /// starting with `/` is added as a path segment.
    #[must_use]
    pub fn suffixes(&self, suffixes: &[&str]) -> Self {
        let suffixes = suffixes.iter().map(|suffix| (*suffix).to_string()).collect();
        self.configure(|spec| spec.suffixes = Some(suffixes))
    }

    #[must_use]
    pub fn prefixes(&self, prefixes: &[&str]) -> Self {
        let prefixes = prefixes.iter().map(|prefix| (*prefix).to_string()).collect();
        self.configure(|spec| spec.prefixes = Some(prefixes))
    }

    /// Leave the route out of generated documentation.
    #[must_use]
    pub fn private(&self) -> Self {
        self.configure(|spec| spec.private = Some(true))
    }
}

impl Router for HttpRouter {
    type Interface = HttpInterface;

    fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    fn from_spec(spec: RouteSpec) -> Self {
        Self { spec }
    }

    fn route(&self, api: &mut Api, endpoint: &Endpoint) -> Arc<HttpInterface> {
        let interface = Arc::new(HttpInterface::new(api, endpoint, &self.spec, InterfaceRole::Route));
        let methods = self.spec.accept.clone().unwrap_or_else(all_methods);
        let versions = self.spec.versions_or_default();
        let urls = self.spec.expanded_urls(endpoint);
        for url in &urls {
            for method in &methods {
                for version in &versions {
                    api.http
                        .add_route(url, method.clone(), *version, Arc::clone(&interface));
                }
            }
        }
        for version in &versions {
            api.http
                .add_function(*version, endpoint.name(), Arc::clone(&interface));
        }
        info!(
            function = endpoint.name(),
            urls = ?urls,
            methods = ?methods.iter().map(Method::as_str).collect::<Vec<_>>(),
            versions = ?versions,
            "route registered"
        );
        interface
    }
}

impl HttpOptions for HttpRouter {}

impl SinkRouter {
    /// The path prefix served by the sink.
    #[must_use]
    pub fn prefix(&self, prefix: &str) -> Self {
        self.configure(|spec| spec.prefix = Some(prefix.to_string()))
    }
}

impl Router for SinkRouter {
    type Interface = HttpInterface;

    fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    fn from_spec(spec: RouteSpec) -> Self {
        Self { spec }
    }

    fn route(&self, api: &mut Api, endpoint: &Endpoint) -> Arc<HttpInterface> {
        let interface = Arc::new(HttpInterface::new(api, endpoint, &self.spec, InterfaceRole::Sink));
        let prefix = self.spec.prefix.clone().unwrap_or_default();
        for version in self.spec.versions_or_default() {
            api.http.add_sink(&prefix, version, Arc::clone(&interface));
        }
        info!(function = endpoint.name(), prefix = %prefix, "sink registered");
        interface
    }
}

impl HttpOptions for SinkRouter {}

impl Router for NotFoundRouter {
    type Interface = HttpInterface;

    fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    fn from_spec(spec: RouteSpec) -> Self {
        Self { spec }
    }

    fn route(&self, api: &mut Api, endpoint: &Endpoint) -> Arc<HttpInterface> {
        let mut spec = self.spec.clone();
        spec.status.get_or_insert(StatusCode::NOT_FOUND);
        let interface = Arc::new(HttpInterface::new(api, endpoint, &spec, InterfaceRole::NotFound));
        for version in spec.versions_or_default() {
            api.http
                .set_not_found_handler(version, Arc::clone(&interface));
        }
        info!(function = endpoint.name(), "not found handler registered");
        interface
    }
}

impl HttpOptions for NotFoundRouter {}

impl ExceptionRouter {
    /// Kinds this handler claims (descendants included).
    #[must_use]
    pub fn exceptions(&self, kinds: &[&'static ErrorKind]) -> Self {
        let kinds = kinds.to_vec();
        self.configure(|spec| spec.exceptions = Some(kinds))
    }

    /// Kinds this handler never claims, even when they descend from a
    /// claimed kind.
    #[must_use]
    pub fn exclude(&self, kinds: &[&'static ErrorKind]) -> Self {
        let kinds = kinds.to_vec();
        self.configure(|spec| spec.exclude = Some(kinds))
    }
}

impl Router for ExceptionRouter {
    type Interface = HttpInterface;

    fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    fn from_spec(spec: RouteSpec) -> Self {
        Self { spec }
    }

    fn route(&self, api: &mut Api, endpoint: &Endpoint) -> Arc<HttpInterface> {
        let interface = Arc::new(HttpInterface::new(api, endpoint, &self.spec, InterfaceRole::Exception));
        let kinds = self
            .spec
            .exceptions
            .clone()
            .unwrap_or_else(|| vec![&crate::error::kinds::APPLICATION]);
        let exclude = self.spec.exclude.clone().unwrap_or_default();
        for version in self.spec.versions_or_default() {
            for kind in &kinds {
                api.http
                    .add_exception_handler(version, kind, exclude.clone(), Arc::clone(&interface));
            }
        }
        info!(
            function = endpoint.name(),
            kinds = ?kinds.iter().map(|kind| kind.name()).collect::<Vec<_>>(),
            "exception handler registered"
        );
        interface
    }
}

impl HttpOptions for ExceptionRouter {}

impl CliRouter {
    /// The command name (default: the function name).
    #[must_use]
    pub fn name(&self, name: &str) -> Self {
        self.configure(|spec| spec.name = Some(name.to_string()))
    }

    /// Adds `-v/--version` printing this version.
    #[must_use]
    pub fn version(&self, version: &str) -> Self {
        self.configure(|spec| spec.version = Some(version.to_string()))
    }
}

impl Router for CliRouter {
    type Interface = CliInterface;

    fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    fn from_spec(spec: RouteSpec) -> Self {
        Self { spec }
    }

    fn route(&self, api: &mut Api, endpoint: &Endpoint) -> Arc<CliInterface> {
        let interface = Arc::new(CliInterface::new(api, endpoint, &self.spec));
        api.cli.add_command(Arc::clone(&interface));
        debug!(command = interface.name(), "command registered");
        interface
    }
}

impl LocalRouter {
    #[must_use]
    pub fn skip_directives(&self) -> Self {
        self.configure(|spec| spec.skip_directives = Some(true))
    }

    #[must_use]
    pub fn skip_validation(&self) -> Self {
        self.configure(|spec| spec.skip_validation = Some(true))
    }
}

impl Router for LocalRouter {
    type Interface = LocalInterface;

    fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    fn from_spec(spec: RouteSpec) -> Self {
        Self { spec }
    }

    fn route(&self, api: &mut Api, endpoint: &Endpoint) -> Arc<LocalInterface> {
        let interface = Arc::new(LocalInterface::new(api, endpoint, &self.spec));
        api.add_local(Arc::clone(&interface));
        debug!(function = interface.name(), "local function registered");
        interface
    }
}

/// A URL router accepting every method.
#[must_use]
pub fn http() -> HttpRouter {
    HttpRouter::default()
}

/// Convenience for `http().get()`.
#[must_use]
pub fn get() -> HttpRouter {
    http().get()
}

#[must_use]
pub fn post() -> HttpRouter {
    http().post()
}

#[must_use]
pub fn put() -> HttpRouter {
    http().put()
}

#[must_use]
pub fn delete() -> HttpRouter {
    http().delete()
}

#[must_use]
pub fn sink(prefix: &str) -> SinkRouter {
    SinkRouter::default().prefix(prefix)
}

#[must_use]
pub fn not_found() -> NotFoundRouter {
    NotFoundRouter::default()
}

#[must_use]
pub fn exception(kinds: &[&'static ErrorKind]) -> ExceptionRouter {
    ExceptionRouter::default().exceptions(kinds)
}

#[must_use]
pub fn cli() -> CliRouter {
    CliRouter::default()
}

#[must_use]
pub fn local() -> LocalRouter {
    LocalRouter::default()
}
