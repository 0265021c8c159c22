//! # Directives
//!
//! A directive is a named, trusted value computed per call and injected into a
//! handler's parameters without the caller supplying it. A parameter becomes a
//! directive either through an [`Annotation::Directive`](crate::introspect::Annotation)
//! or by name: `with_timer` asks for the directive registered as `timer`.
//!
//! Directives resolve to an [`Injected`] value. Plain values are placed into
//! the gathered parameters; a [`Resource`] is kept for the call and receives
//! exactly one [`Resource::cleanup`] call when the call finishes, carrying the
//! error (if any) so it can decide between commit and rollback.
//!
//! A directive that fails to resolve fails the whole request: it is never
//! reported as a per-parameter validation error.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};

use crate::api::Api;
use crate::context::Context;
use crate::error::ApiError;
use crate::http::{Request, Response};

/// Name prefix that marks an unannotated parameter as a directive.
pub const DIRECTIVE_PREFIX: &str = "with_";

pub type DirectiveRef = Arc<dyn Directive>;

/// Everything a directive may look at when resolving.
pub struct DirectiveContext<'a> {
    /// The parameter's declared default, if any.
    pub default: Option<&'a Value>,
    pub request: Option<&'a Request>,
    pub response: Option<&'a Response>,
    pub api: &'a Api,
    pub api_version: Option<u32>,
    pub context: &'a Context,
    /// Name of the routed function being called.
    pub interface: &'a str,
}

/// A named per-call value factory.
pub trait Directive: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// A failure here is fatal for the request.
    fn resolve(&self, ctx: &DirectiveContext<'_>) -> Result<Injected, ApiError>;

    fn doc(&self) -> String {
        String::new()
    }
}

/// A per-call object produced by a directive.
pub trait Resource: Send + Sync {
    /// The value injected into the handler's parameters.
    fn as_value(&self) -> Value;

    /// Called exactly once when the call finishes.
    fn cleanup(&self, _error: Option<&ApiError>) {}

    fn as_any(&self) -> &dyn Any;
}

/// What a directive produced.
#[derive(Clone)]
pub enum Injected {
    Value(Value),
    Resource(Arc<dyn Resource>),
}

impl Injected {
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Injected::Value(value) => value.clone(),
            Injected::Resource(resource) => resource.as_value(),
        }
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Injected::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Injected::Resource(resource) => {
                f.debug_tuple("Resource").field(&resource.as_value()).finish()
            }
        }
    }
}

/// The directive values resolved for one call, keyed by parameter name.
#[derive(Default, Debug)]
pub struct DirectiveValues {
    entries: Vec<(String, Injected)>,
}

impl DirectiveValues {
    pub fn insert(&mut self, name: impl Into<String>, value: Injected) {
        self.entries.push((name.into(), value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Injected> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Downcast an injected resource.
    #[must_use]
    pub fn resource<T: Any>(&self, name: &str) -> Option<&T> {
        match self.get(name)? {
            Injected::Resource(resource) => resource.as_any().downcast_ref::<T>(),
            Injected::Value(_) => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every value into `params`. With `overwrite` unset, values the
    /// caller already supplied are kept.
    pub fn inject_into(&self, params: &mut Map<String, Value>, overwrite: bool) {
        for (name, injected) in &self.entries {
            if overwrite || !params.contains_key(name) {
                params.insert(name.clone(), injected.to_value());
            }
        }
    }

    /// Release every resource. Draining guarantees each cleanup runs once.
    pub fn cleanup(&mut self, error: Option<&ApiError>) {
        for (_, injected) in std::mem::take(&mut self.entries) {
            if let Injected::Resource(resource) = injected {
                resource.cleanup(error);
            }
        }
    }
}

type ResolveFn = dyn Fn(&DirectiveContext<'_>) -> Result<Injected, ApiError> + Send + Sync;

struct FnDirective {
    name: String,
    doc: String,
    resolve: Box<ResolveFn>,
}

impl Directive for FnDirective {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, ctx: &DirectiveContext<'_>) -> Result<Injected, ApiError> {
        (self.resolve)(ctx)
    }

    fn doc(&self) -> String {
        self.doc.clone()
    }
}

/// A directive from a closure producing a plain value.
pub fn from_fn<F>(name: impl Into<String>, doc: impl Into<String>, resolve: F) -> DirectiveRef
where
    F: Fn(&DirectiveContext<'_>) -> Result<Value, ApiError> + Send + Sync + 'static,
{
    Arc::new(FnDirective {
        name: name.into(),
        doc: doc.into(),
        resolve: Box::new(move |ctx| resolve(ctx).map(Injected::Value)),
    })
}

/// A directive from a closure producing a resource with a cleanup hook.
pub fn resource_fn<F>(name: impl Into<String>, doc: impl Into<String>, resolve: F) -> DirectiveRef
where
    F: Fn(&DirectiveContext<'_>) -> Result<Arc<dyn Resource>, ApiError> + Send + Sync + 'static,
{
    Arc::new(FnDirective {
        name: name.into(),
        doc: doc.into(),
        resolve: Box::new(move |ctx| resolve(ctx).map(Injected::Resource)),
    })
}

/// Time elapsed since the call started, in seconds.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    round_to: Option<i32>,
}

impl Timer {
    #[must_use]
    pub fn new(round_to: Option<i32>) -> Self {
        Self {
            start: Instant::now(),
            round_to,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        match self.round_to {
            Some(digits) => {
                let factor = 10f64.powi(digits);
                (elapsed * factor).round() / factor
            }
            None => elapsed,
        }
    }

    /// Replace `{elapsed}` in `template`.
    #[must_use]
    pub fn format(&self, template: &str) -> String {
        template.replace("{elapsed}", &self.elapsed().to_string())
    }
}

impl Resource for Timer {
    fn as_value(&self) -> Value {
        json!(self.elapsed())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The API as seen from a handler: its name, the active version and the
/// functions routed for that version.
#[derive(Debug, Clone)]
pub struct CurrentApi {
    pub name: String,
    pub version: Option<u32>,
    pub functions: Vec<String>,
}

impl Resource for CurrentApi {
    fn as_value(&self) -> Value {
        json!({
            "name": self.name,
            "version": self.version,
            "functions": self.functions,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn request_value(ctx: &DirectiveContext<'_>, key: &str) -> Value {
    ctx.request
        .and_then(|request| request.context.get(key).cloned())
        .or_else(|| ctx.default.cloned())
        .unwrap_or(Value::Null)
}

/// Starts a [`Timer`]; the default is the number of digits to round to.
#[must_use]
pub fn timer() -> DirectiveRef {
    resource_fn("timer", "Keeps track of time surpased since instantiation", |ctx| {
        let round_to = ctx
            .default
            .and_then(Value::as_i64)
            .and_then(|digits| i32::try_from(digits).ok());
        Ok(Arc::new(Timer::new(round_to)) as Arc<dyn Resource>)
    })
}

#[must_use]
pub fn api_version() -> DirectiveRef {
    from_fn("api_version", "Returns the current api version", |ctx| {
        Ok(json!(ctx.api_version))
    })
}

#[must_use]
pub fn module() -> DirectiveRef {
    from_fn("module", "Returns the name of the API the call is routed on", |ctx| {
        Ok(Value::String(ctx.api.name().to_string()))
    })
}

fn current_api_directive(name: &'static str) -> DirectiveRef {
    resource_fn(name, "Returns the current api, bound to the active version", |ctx| {
        Ok(Arc::new(CurrentApi {
            name: ctx.api.name().to_string(),
            version: ctx.api_version,
            functions: ctx.api.http.function_names(ctx.api_version),
        }) as Arc<dyn Resource>)
    })
}

#[must_use]
pub fn api() -> DirectiveRef {
    current_api_directive("api")
}

#[must_use]
pub fn current_api() -> DirectiveRef {
    current_api_directive("current_api")
}

/// The authenticated user stored on the request by an authenticator.
#[must_use]
pub fn user() -> DirectiveRef {
    from_fn("user", "Returns the current logged in user", |ctx| {
        Ok(request_value(ctx, "user"))
    })
}

/// The session stored on the request by the session middleware.
#[must_use]
pub fn session() -> DirectiveRef {
    from_fn("session", "Returns the session associated with the current request", |ctx| {
        Ok(request_value(ctx, "session"))
    })
}

#[must_use]
pub fn documentation() -> DirectiveRef {
    from_fn("documentation", "Returns the documentation of the current api", |ctx| {
        Ok(ctx.api.documentation(ctx.api_version))
    })
}

/// Every built-in directive.
#[must_use]
pub fn builtins() -> Vec<DirectiveRef> {
    vec![
        timer(),
        api_version(),
        module(),
        api(),
        current_api(),
        user(),
        session(),
        documentation(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted(Arc<AtomicUsize>);

    impl Resource for Counted {
        fn as_value(&self) -> Value {
            Value::from("db")
        }

        fn cleanup(&self, _error: Option<&ApiError>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_cleanup_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut values = DirectiveValues::default();
        values.insert("db", Injected::Resource(Arc::new(Counted(Arc::clone(&calls)))));
        values.insert("api_version", Injected::Value(json!(2)));
        let mut params = Map::new();
        params.insert("api_version".to_string(), json!(1));
        values.inject_into(&mut params, false);
        assert_eq!(params.get("api_version"), Some(&json!(1)));
        assert_eq!(params.get("db"), Some(&json!("db")));
        values.cleanup(None);
        values.cleanup(None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_timer_format() {
        let timer = Timer::new(Some(0));
        assert_eq!(timer.format("took {elapsed}s"), "took 0s");
        let values = {
            let mut values = DirectiveValues::default();
            values.insert("with_timer", Injected::Resource(Arc::new(Timer::new(None))));
            values
        };
        assert!(values.resource::<Timer>("with_timer").is_some());
        assert!(values.resource::<CurrentApi>("with_timer").is_none());
    }

    #[test]
    fn test_user_directive_reads_request_context() {
        let api = Api::new("users");
        let context = Context::default();
        let mut request = Request::get("/");
        request.context.insert("user".to_string(), json!("ada"));
        let ctx = DirectiveContext {
            default: None,
            request: Some(&request),
            response: None,
            api: &api,
            api_version: None,
            context: &context,
            interface: "whoami",
        };
        assert_eq!(user().resolve(&ctx).unwrap().to_value(), json!("ada"));
        let anonymous = json!("anonymous");
        let ctx = DirectiveContext {
            default: Some(&anonymous),
            request: None,
            ..ctx
        };
        assert_eq!(user().resolve(&ctx).unwrap().to_value(), json!("anonymous"));
    }
}
