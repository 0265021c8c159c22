//! # API Registry
//!
//! An [`Api`] collects everything routed for one application: the HTTP route
//! table with its versioned function table, sinks, not-found and exception
//! handlers, the CLI commands, the locally callable functions, directives,
//! middleware, startup handlers and the per-call context hooks.
//!
//! The registry is built during startup (routers register into it through
//! `&mut Api`) and is read-only once [`Api::server`] materialises it into an
//! [`ApiServer`]. Nothing on the request path takes a lock.
//!
//! ```rust
//! use hugroute::api::Api;
//! use hugroute::http::Request;
//! use hugroute::route::{self, Router};
//! use hugroute::{Call, Endpoint, Signature};
//!
//! let mut api = Api::new("hello");
//! let hello = Endpoint::new(Signature::new("hello").param("name"), |call: &mut Call<'_>| {
//!     format!("hello {}", call.param("name").and_then(|name| name.as_str()).unwrap_or("?"))
//! });
//! route::get().route(&mut api, &hello);
//!
//! let server = api.server().unwrap();
//! let mut response = server.handle(Request::get("/hello?name=ada")).unwrap();
//! assert_eq!(response.json().unwrap(), "hello ada");
//! ```

mod server;
pub mod version;

pub use server::ApiServer;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Once};

use http::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::context::{Context, InterfaceKind, Outcome};
use crate::directives::{self, DirectiveRef};
use crate::error::{ApiError, Error, ErrorKind};
use crate::format::input::{self, InputFormatRef};
use crate::format::output::{self, OutputFormatRef, Payload};
use crate::http::{Request, Response};
use crate::interface::{CliApi, Endpoint, HttpInterface, LocalInterface};
use crate::middleware::Middleware;

pub type StartupHandler = Arc<dyn Fn(&Api) + Send + Sync>;
pub type ContextFactory = Arc<dyn Fn(InterfaceKind, &str, Option<u32>) -> Context + Send + Sync>;
pub type ContextCleanup = Arc<dyn Fn(Context, &Outcome<'_>) + Send + Sync>;

pub const NOT_FOUND_MESSAGE: &str =
    "The API call you tried to make was not defined. Here's a definition of the API to help you get going :)";

/// Interfaces registered under one URL, by method then version.
#[derive(Clone, Default)]
pub struct MethodTable {
    entries: Vec<(Method, Vec<(Option<u32>, Arc<HttpInterface>)>)>,
}

impl MethodTable {
    fn slot(&mut self, method: Method) -> &mut Vec<(Option<u32>, Arc<HttpInterface>)> {
        let index = match self.entries.iter().position(|(existing, _)| *existing == method) {
            Some(index) => index,
            None => {
                self.entries.push((method, Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    fn insert(&mut self, method: Method, version: Option<u32>, interface: Arc<HttpInterface>) {
        let versions = self.slot(method);
        match versions.iter_mut().find(|(existing, _)| *existing == version) {
            Some(slot) => slot.1 = interface,
            None => versions.push((version, interface)),
        }
    }

    fn insert_missing(&mut self, method: Method, version: Option<u32>, interface: Arc<HttpInterface>) {
        let versions = self.slot(method);
        if !versions.iter().any(|(existing, _)| *existing == version) {
            versions.push((version, interface));
        }
    }

    /// The interface for `method` at exactly `version`, else the unversioned
    /// one.
    #[must_use]
    pub fn lookup(&self, method: &Method, version: Option<u32>) -> Option<Arc<HttpInterface>> {
        let (_, versions) = self.entries.iter().find(|(existing, _)| existing == method)?;
        let find = |wanted: Option<u32>| {
            versions
                .iter()
                .find(|(candidate, _)| *candidate == wanted)
                .map(|(_, interface)| Arc::clone(interface))
        };
        find(version).or_else(|| version.and_then(|_| find(None)))
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|(method, _)| method)
    }

    /// Every `(method, version, interface)` triple.
    pub fn iter(&self) -> impl Iterator<Item = (&Method, Option<u32>, &Arc<HttpInterface>)> {
        self.entries.iter().flat_map(|(method, versions)| {
            versions
                .iter()
                .map(move |(version, interface)| (method, *version, interface))
        })
    }
}

struct Sink {
    prefix: String,
    version: Option<u32>,
    interface: Arc<HttpInterface>,
}

struct ExceptionHandler {
    version: Option<u32>,
    kind: &'static ErrorKind,
    exclude: Vec<&'static ErrorKind>,
    interface: Arc<HttpInterface>,
}

/// The HTTP half of an API.
pub struct HttpApi {
    routes: Vec<(String, MethodTable)>,
    sinks: Vec<Sink>,
    versions: BTreeSet<Option<u32>>,
    functions: Vec<(Option<u32>, String, Arc<HttpInterface>)>,
    not_found_handlers: HashMap<Option<u32>, Arc<HttpInterface>>,
    exception_handlers: Vec<ExceptionHandler>,
    middleware: Vec<Arc<dyn Middleware>>,
    input_formats: Vec<(String, InputFormatRef)>,
    output_format: OutputFormatRef,
    base_url: String,
    version_header: String,
    version_param: String,
    documentation_404: bool,
}

impl Default for HttpApi {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            sinks: Vec::new(),
            versions: BTreeSet::new(),
            functions: Vec::new(),
            not_found_handlers: HashMap::new(),
            exception_handlers: Vec::new(),
            middleware: Vec::new(),
            input_formats: input::defaults(),
            output_format: output::json(),
            base_url: String::new(),
            version_header: version::DEFAULT_VERSION_HEADER.to_string(),
            version_param: version::DEFAULT_VERSION_PARAM.to_string(),
            documentation_404: true,
        }
    }
}

impl HttpApi {
    /// Register `interface` for `url`, `method` and `version`, replacing any
    /// earlier registration of the same triple.
    pub fn add_route(&mut self, url: &str, method: Method, version: Option<u32>, interface: Arc<HttpInterface>) {
        self.versions.insert(version);
        self.table_mut(url).insert(method, version, interface);
    }

    fn table_mut(&mut self, url: &str) -> &mut MethodTable {
        let index = match self.routes.iter().position(|(existing, _)| existing == url) {
            Some(index) => index,
            None => {
                self.routes.push((url.to_string(), MethodTable::default()));
                self.routes.len() - 1
            }
        };
        &mut self.routes[index].1
    }

    /// Record `interface` in the versioned function table under `name`.
    pub fn add_function(&mut self, version: Option<u32>, name: &str, interface: Arc<HttpInterface>) {
        self.functions
            .retain(|(existing, function, _)| !(*existing == version && function == name));
        self.functions.push((version, name.to_string(), interface));
    }

    /// The function routed as `name` for `version`, else the unversioned one.
    #[must_use]
    pub fn function(&self, version: Option<u32>, name: &str) -> Option<Arc<HttpInterface>> {
        let find = |wanted: Option<u32>| {
            self.functions
                .iter()
                .find(|(candidate, function, _)| *candidate == wanted && function == name)
                .map(|(_, _, interface)| Arc::clone(interface))
        };
        find(version).or_else(|| version.and_then(|_| find(None)))
    }

    /// Names of the functions routed for `version` (unversioned ones included).
    #[must_use]
    pub fn function_names(&self, version: Option<u32>) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (candidate, name, _) in &self.functions {
            if (*candidate == version || candidate.is_none()) && !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// The route `endpoint` was registered under for `version`, else its
    /// unversioned route.
    #[must_use]
    pub fn routed(&self, endpoint: &Endpoint, version: Option<u32>) -> Option<Arc<HttpInterface>> {
        let find = |wanted: Option<u32>| {
            self.functions
                .iter()
                .find(|(candidate, _, interface)| {
                    *candidate == wanted && interface.core().endpoint().same_as(endpoint)
                })
                .map(|(_, _, interface)| Arc::clone(interface))
        };
        find(version).or_else(|| version.and_then(|_| find(None)))
    }

    pub fn add_sink(&mut self, prefix: &str, version: Option<u32>, interface: Arc<HttpInterface>) {
        self.versions.insert(version);
        self.sinks.push(Sink {
            prefix: prefix.to_string(),
            version,
            interface,
        });
    }

    /// The most recently registered sink whose prefix `path` starts with, for
    /// `version` or else unversioned.
    #[must_use]
    pub fn sink(&self, path: &str, version: Option<u32>) -> Option<Arc<HttpInterface>> {
        let find = |wanted: Option<u32>| {
            self.sinks
                .iter()
                .rev()
                .find(|sink| sink.version == wanted && path.starts_with(&sink.prefix))
                .map(|sink| Arc::clone(&sink.interface))
        };
        find(version).or_else(|| version.and_then(|_| find(None)))
    }

    pub fn set_not_found_handler(&mut self, version: Option<u32>, interface: Arc<HttpInterface>) {
        self.not_found_handlers.insert(version, interface);
    }

    #[must_use]
    pub fn not_found_handler(&self, version: Option<u32>) -> Option<Arc<HttpInterface>> {
        self.not_found_handlers
            .get(&version)
            .or_else(|| self.not_found_handlers.get(&None))
            .map(Arc::clone)
    }

    pub fn add_exception_handler(
        &mut self,
        version: Option<u32>,
        kind: &'static ErrorKind,
        exclude: Vec<&'static ErrorKind>,
        interface: Arc<HttpInterface>,
    ) {
        self.exception_handlers.push(ExceptionHandler {
            version,
            kind,
            exclude,
            interface,
        });
    }

    /// The handler for `err`: the registered kind nearest to the error's own
    /// kind wins, and among equally near kinds the latest registration wins.
    /// Handlers for `version` are preferred over unversioned ones.
    #[must_use]
    pub fn exception_handler(&self, err: &ApiError, version: Option<u32>) -> Option<Arc<HttpInterface>> {
        let kind = err.kind();
        let pick = |wanted: Option<u32>| {
            self.exception_handlers
                .iter()
                .rev()
                .filter(|handler| handler.version == wanted)
                .filter(|handler| !handler.exclude.iter().any(|excluded| kind.is_a(excluded)))
                .filter_map(|handler| kind.distance_to(handler.kind).map(|distance| (distance, handler)))
                .min_by_key(|(distance, _)| *distance)
                .map(|(_, handler)| Arc::clone(&handler.interface))
        };
        pick(version).or_else(|| version.and_then(|_| pick(None)))
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    /// Decode request bodies of `content_type` with `format`.
    pub fn set_input_format(&mut self, content_type: &str, format: InputFormatRef) {
        let content_type = content_type.to_ascii_lowercase();
        self.input_formats.retain(|(existing, _)| *existing != content_type);
        self.input_formats.push((content_type, format));
    }

    #[must_use]
    pub fn input_format(&self, content_type: &str) -> Option<InputFormatRef> {
        self.input_formats
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(content_type))
            .map(|(_, format)| Arc::clone(format))
    }

    pub fn set_output_format(&mut self, format: OutputFormatRef) {
        self.output_format = format;
    }

    #[must_use]
    pub fn output_format(&self) -> OutputFormatRef {
        Arc::clone(&self.output_format)
    }

    /// Mount point stripped from request paths before routing.
    pub fn set_base_url(&mut self, base_url: &str) {
        self.base_url = base_url.trim_end_matches('/').to_string();
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_version_header(&mut self, header: &str) {
        self.version_header = header.to_string();
    }

    pub fn set_version_param(&mut self, param: &str) {
        self.version_param = param.to_string();
    }

    #[must_use]
    pub fn version_header(&self) -> &str {
        &self.version_header
    }

    #[must_use]
    pub fn version_param(&self) -> &str {
        &self.version_param
    }

    /// Whether the default 404 body carries the API documentation.
    pub fn set_documentation_404(&mut self, enabled: bool) {
        self.documentation_404 = enabled;
    }

    /// Every version routes were registered for, `None` included.
    pub fn versions(&self) -> impl Iterator<Item = Option<u32>> + '_ {
        self.versions.iter().copied()
    }

    /// True once any route declares an explicit version.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.versions.iter().any(Option::is_some)
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, &MethodTable)> {
        self.routes.iter().map(|(url, table)| (url.as_str(), table))
    }

    fn merge(&mut self, other: &HttpApi, prefix: &str) {
        for (url, table) in &other.routes {
            let url = format!("{prefix}{url}");
            let target = self.table_mut(&url);
            for (method, version, interface) in table.iter() {
                target.insert_missing(method.clone(), version, Arc::clone(interface));
            }
        }
        self.versions.extend(other.versions.iter().copied());
        for sink in &other.sinks {
            self.sinks.push(Sink {
                prefix: format!("{prefix}{}", sink.prefix),
                version: sink.version,
                interface: Arc::clone(&sink.interface),
            });
        }
        for (version, name, interface) in &other.functions {
            if !self
                .functions
                .iter()
                .any(|(existing, function, _)| existing == version && function == name)
            {
                self.functions.push((*version, name.clone(), Arc::clone(interface)));
            }
        }
        for (version, interface) in &other.not_found_handlers {
            self.not_found_handlers
                .entry(*version)
                .or_insert_with(|| Arc::clone(interface));
        }
        for handler in &other.exception_handlers {
            let defined = self
                .exception_handlers
                .iter()
                .any(|existing| existing.version == handler.version && existing.kind == handler.kind);
            if !defined {
                self.exception_handlers.push(ExceptionHandler {
                    version: handler.version,
                    kind: handler.kind,
                    exclude: handler.exclude.clone(),
                    interface: Arc::clone(&handler.interface),
                });
            }
        }
        self.middleware
            .extend(other.middleware.iter().map(Arc::clone));
        for (content_type, format) in &other.input_formats {
            if self.input_format(content_type).is_none() {
                self.input_formats
                    .push((content_type.clone(), Arc::clone(format)));
            }
        }
    }
}

/// A complete API.
pub struct Api {
    name: String,
    doc: Option<String>,
    pub http: HttpApi,
    pub cli: CliApi,
    locals: Vec<Arc<LocalInterface>>,
    directives: Vec<DirectiveRef>,
    startup_handlers: Vec<StartupHandler>,
    started: Once,
    context_factory: Option<ContextFactory>,
    context_cleanup: Option<ContextCleanup>,
}

impl Api {
    /// An empty API with the built-in directives and formats.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            http: HttpApi::default(),
            cli: CliApi::default(),
            locals: Vec::new(),
            directives: directives::builtins(),
            startup_handlers: Vec::new(),
            started: Once::new(),
            context_factory: None,
            context_cleanup: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overview text used in generated documentation.
    pub fn set_doc(&mut self, doc: impl Into<String>) {
        self.doc = Some(doc.into());
    }

    /// Register a directive, replacing one of the same name.
    pub fn add_directive(&mut self, directive: DirectiveRef) {
        self.directives
            .retain(|existing| existing.name() != directive.name());
        self.directives.push(directive);
    }

    #[must_use]
    pub fn directive(&self, name: &str) -> Option<DirectiveRef> {
        self.directives
            .iter()
            .find(|directive| directive.name() == name)
            .map(Arc::clone)
    }

    pub fn directive_names(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().map(|directive| directive.name())
    }

    pub fn add_startup_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Api) + Send + Sync + 'static,
    {
        self.startup_handlers.push(Arc::new(handler));
    }

    /// Run the startup handlers, in registration order, the first time this
    /// is called. Later calls (and concurrent ones) wait for or skip the run.
    pub fn start(&self) {
        self.started.call_once(|| {
            info!(api = %self.name, handlers = self.startup_handlers.len(), "running startup handlers");
            for handler in &self.startup_handlers {
                handler(self);
            }
        });
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.is_completed()
    }

    /// Build every call's [`Context`] with `factory`.
    pub fn set_context_factory<F>(&mut self, factory: F)
    where
        F: Fn(InterfaceKind, &str, Option<u32>) -> Context + Send + Sync + 'static,
    {
        self.context_factory = Some(Arc::new(factory));
    }

    /// Hand every finished call's [`Context`] and outcome to `cleanup`.
    pub fn set_context_cleanup<F>(&mut self, cleanup: F)
    where
        F: Fn(Context, &Outcome<'_>) + Send + Sync + 'static,
    {
        self.context_cleanup = Some(Arc::new(cleanup));
    }

    #[must_use]
    pub fn create_context(&self, kind: InterfaceKind, interface: &str, api_version: Option<u32>) -> Context {
        match &self.context_factory {
            Some(factory) => factory(kind, interface, api_version),
            None => Context::new(kind, interface, api_version),
        }
    }

    pub fn delete_context(&self, context: Context, outcome: &Outcome<'_>) {
        if let Some(cleanup) = &self.context_cleanup {
            cleanup(context, outcome);
        }
    }

    /// Register a locally callable function, replacing one of the same name.
    pub fn add_local(&mut self, interface: Arc<LocalInterface>) {
        self.locals
            .retain(|existing| existing.name() != interface.name());
        self.locals.push(interface);
    }

    #[must_use]
    pub fn local(&self, name: &str) -> Option<Arc<LocalInterface>> {
        self.locals
            .iter()
            .find(|interface| interface.name() == name)
            .map(Arc::clone)
    }

    /// Call the local function `name`.
    ///
    /// # Errors
    ///
    /// Not-found when nothing is registered under `name`; otherwise see
    /// [`LocalInterface::call`].
    pub fn call(&self, name: &str, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Value, Error> {
        let interface = self
            .local(name)
            .ok_or_else(|| Error::Unhandled(ApiError::not_found()))?;
        interface.call(self, args, kwargs)
    }

    /// Serve a request nothing was routed for: the version's not-found
    /// handler, else the unversioned one, else the default 404.
    ///
    /// # Errors
    ///
    /// Propagates failures of a custom not-found handler.
    pub fn not_found(
        &self,
        request: &mut Request,
        response: &mut Response,
        api_version: Option<u32>,
    ) -> Result<(), Error> {
        if let Some(handler) = self.http.not_found_handler(api_version) {
            debug!(path = %request.path, handler = handler.name(), "dispatching to not found handler");
            return handler.call(self, request, response, api_version, Map::new());
        }
        debug!(path = %request.path, "no route matched, serving default 404");
        let mut body = Map::new();
        body.insert("404".to_string(), Value::from(NOT_FOUND_MESSAGE));
        if self.http.documentation_404 {
            body.insert("documentation".to_string(), self.documentation(api_version));
        }
        let output = self.http.output_format();
        let rendered = output
            .format(Payload::Data(Value::Object(body)), Some(request))
            .map_err(Error::Unhandled)?;
        response.status = StatusCode::NOT_FOUND;
        response.content_type = Some(
            rendered
                .content_type
                .unwrap_or_else(|| output.content_type(Some(request))),
        );
        response.body = rendered.body;
        Ok(())
    }

    /// Self-describing documentation of the HTTP routes.
    ///
    /// With routes in a single version the handlers are listed at the top
    /// level; otherwise they are grouped under `versions`. Unversioned routes
    /// appear under every version.
    #[must_use]
    pub fn documentation(&self, api_version: Option<u32>) -> Value {
        let mut doc = Map::new();
        if let Some(overview) = &self.doc {
            doc.insert("overview".to_string(), Value::from(overview.clone()));
        }
        let known: Vec<Option<u32>> = self.http.versions().collect();
        let shown: Vec<Option<u32>> = match api_version {
            Some(version) => vec![Some(version)],
            None => known.clone(),
        };
        let mut by_version: Vec<(Option<u32>, Map<String, Value>)> =
            shown.iter().map(|version| (*version, Map::new())).collect();

        for (url, table) in self.http.routes() {
            for (method, version, interface) in table.iter() {
                if interface.is_private() {
                    continue;
                }
                let applies: Vec<Option<u32>> = match version {
                    None => shown.clone(),
                    Some(_) => vec![version],
                };
                for target in applies {
                    let Some((_, handlers)) = by_version
                        .iter_mut()
                        .find(|(candidate, _)| *candidate == target)
                    else {
                        continue;
                    };
                    let methods = handlers
                        .entry(url.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(methods) = methods {
                        // Versioned handlers shadow the unversioned fallback.
                        if version.is_none() && methods.contains_key(method.as_str()) {
                            continue;
                        }
                        methods.insert(
                            method.as_str().to_string(),
                            self.handler_documentation(interface, target, url),
                        );
                    }
                }
            }
        }

        if by_version.len() == 1 {
            if let Some((_, handlers)) = by_version.pop() {
                doc.insert("handlers".to_string(), Value::Object(handlers));
            }
        } else {
            let versions: Map<String, Value> = by_version
                .into_iter()
                .filter_map(|(version, handlers)| version.map(|version| (version.to_string(), Value::Object(handlers))))
                .collect();
            doc.insert("versions".to_string(), Value::Object(versions));
        }
        Value::Object(doc)
    }

    fn handler_documentation(&self, interface: &HttpInterface, version: Option<u32>, url: &str) -> Value {
        let mut doc = match interface.documentation(self) {
            Value::Object(doc) => doc,
            _ => Map::new(),
        };
        let base = match version {
            Some(version) => format!("{}/v{version}{url}", self.http.base_url),
            None => format!("{}{url}", self.http.base_url),
        };
        let examples: Vec<Value> = interface
            .examples()
            .iter()
            .map(|example| {
                if example.is_empty() {
                    Value::from(base.clone())
                } else {
                    Value::from(format!("{base}?{example}"))
                }
            })
            .collect();
        if !examples.is_empty() {
            doc.insert("examples".to_string(), Value::Array(examples));
        }
        Value::Object(doc)
    }

    /// Merge `other` into this API, mounting its routes and sinks under
    /// `prefix`. Routes, handlers, directives and formats this API already
    /// defines are kept; middleware and startup handlers are appended.
    pub fn extend(&mut self, other: &Api, prefix: &str) {
        self.http.merge(&other.http, prefix);
        self.cli.merge(&other.cli);
        for directive in &other.directives {
            if self.directive(directive.name()).is_none() {
                self.directives.push(Arc::clone(directive));
            }
        }
        for local in &other.locals {
            if self.local(local.name()).is_none() {
                self.locals.push(Arc::clone(local));
            }
        }
        self.startup_handlers
            .extend(other.startup_handlers.iter().map(Arc::clone));
        info!(api = %self.name, from = %other.name, prefix = %prefix, "extended api");
    }

    /// Freeze the registry into a dispatchable server.
    ///
    /// # Errors
    ///
    /// Fails when a route template does not compile.
    pub fn server(self) -> Result<ApiServer, Error> {
        ApiServer::new(Arc::new(self))
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("name", &self.name)
            .field("routes", &self.http.routes.len())
            .field("commands", &self.cli)
            .field("directives", &self.directive_names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
