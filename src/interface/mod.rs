//! # Interfaces
//!
//! An [`Endpoint`] is a routed function: a [`Signature`] plus a handler
//! closure. Routing an endpoint builds one interface per route:
//!
//! - [`HttpInterface`] runs the request state machine: response defaults,
//!   requirements, gather, validate, invoke, transform, serialize.
//! - [`CliInterface`] gathers parameters from an argument vector.
//! - [`LocalInterface`] is called directly with positional and keyword values.
//!
//! Everything derived from the signature alone is computed once per endpoint
//! and cached on it. Everything derived from the route (overridden parameters,
//! the parameter roles, the resolved transform) is computed once per route
//! into an [`InterfaceCore`]. Interfaces hold no per-call state, so a single
//! instance serves concurrent calls.
//!
//! Handlers receive a [`Call`] and return anything implementing
//! [`IntoContent`]:
//!
//! ```rust
//! use hugroute::{ApiError, Call, Endpoint, Signature};
//! use hugroute::types;
//!
//! let double = Endpoint::new(
//!     Signature::new("double").param_with("value", types::number()),
//!     |call: &mut Call<'_>| -> Result<i64, ApiError> {
//!         let value: i64 = call.arg("value")?;
//!         Ok(value * 2)
//!     },
//! );
//! assert_eq!(double.name(), "double");
//! ```

mod cli;
mod http;
mod local;

pub use cli::{CliApi, CliInterface};
pub use http::{HttpInterface, InterfaceRole};
pub use local::LocalInterface;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::api::Api;
use crate::context::Context;
use crate::directives::{
    DirectiveContext, DirectiveRef, DirectiveValues, Injected, Resource, DIRECTIVE_PREFIX,
};
use crate::error::{ApiError, Error};
use crate::http::{Readable, Request, Response};
use crate::introspect::{self, Annotation, Signature};
use crate::route::RouteSpec;
use crate::transform::{Transform, TransformContext};
use crate::types::{self, TypeRef};
use crate::validate::ValidateFn;

type HandlerFn = dyn Fn(&mut Call<'_>) -> Result<Content, ApiError> + Send + Sync;

/// A routable function.
///
/// Cloning is cheap; clones share the handler and the cached signature
/// analysis.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

struct EndpointInner {
    signature: Signature,
    handler: Box<HandlerFn>,
    shared: OnceLock<Interfaces>,
}

impl Endpoint {
    pub fn new<F, R>(signature: Signature, handler: F) -> Self
    where
        F: Fn(&mut Call<'_>) -> R + Send + Sync + 'static,
        R: IntoContent,
    {
        Self {
            inner: Arc::new(EndpointInner {
                signature,
                handler: Box::new(move |call| handler(call).into_content()),
                shared: OnceLock::new(),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.signature.name()
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// The signature analysis, built on first use.
    pub(crate) fn interfaces(&self) -> &Interfaces {
        self.inner
            .shared
            .get_or_init(|| Interfaces::new(&self.inner.signature))
    }

    fn invoke(&self, call: &mut Call<'_>) -> Result<Content, ApiError> {
        (self.inner.handler)(call)
    }

    /// Whether two handles refer to the same function.
    #[must_use]
    pub fn same_as(&self, other: &Endpoint) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Signature-derived data shared by every interface of one endpoint.
pub(crate) struct Interfaces {
    parameters: Vec<String>,
    defaults: Map<String, Value>,
    annotations: Vec<(String, Annotation)>,
    var_args: Option<String>,
    takes_kwargs: bool,
    transform: Option<Transform>,
    doc: Option<String>,
    injects_directives: bool,
}

impl Interfaces {
    fn new(signature: &Signature) -> Self {
        Self {
            parameters: introspect::arguments(Some(signature)),
            defaults: signature.defaults(),
            annotations: signature
                .visible_params()
                .filter_map(|param| {
                    param
                        .annotation
                        .clone()
                        .map(|annotation| (param.name.clone(), annotation))
                })
                .collect(),
            var_args: signature.var_args_name().map(str::to_string),
            takes_kwargs: introspect::takes_kwargs(Some(signature)),
            transform: signature.return_transform().cloned(),
            doc: signature.documentation().map(str::to_string),
            injects_directives: signature.injects_directives(),
        }
    }
}

/// What a parameter is, resolved once per route.
#[derive(Clone)]
pub enum ParameterRole {
    /// Injected by a directive; never validated, never required.
    Directive(DirectiveRef),
    /// Converted and validated before the call.
    Validator(TypeRef),
    /// Passed through untouched.
    Plain,
}

impl fmt::Debug for ParameterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterRole::Directive(directive) => write!(f, "Directive({})", directive.name()),
            ParameterRole::Validator(ty) => write!(f, "Validator({})", ty.doc()),
            ParameterRole::Plain => f.write_str("Plain"),
        }
    }
}

/// A route option that can inherit, be switched off, or be replaced.
#[derive(Clone, Debug, Default)]
pub enum Override<T> {
    #[default]
    Inherit,
    Disable,
    Use(T),
}

impl<T: Clone> Override<T> {
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self, Override::Inherit)
    }

    /// `self` when set, otherwise `base`.
    #[must_use]
    pub fn or(&self, base: &Override<T>) -> Override<T> {
        if self.is_set() {
            self.clone()
        } else {
            base.clone()
        }
    }

    /// Resolve against the inherited value.
    #[must_use]
    pub fn resolve(&self, inherited: Option<&T>) -> Option<T> {
        match self {
            Override::Inherit => inherited.cloned(),
            Override::Disable => None,
            Override::Use(value) => Some(value.clone()),
        }
    }
}

/// Result of a single requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum Conclusion {
    Pass,
    /// Stop and render this value as the response.
    Deny(Value),
}

/// What a requirement can see and touch.
pub struct RequirementContext<'a> {
    pub request: Option<&'a mut Request>,
    pub response: Option<&'a mut Response>,
    pub context: &'a Context,
    pub api_version: Option<u32>,
}

pub type Requirement =
    Arc<dyn Fn(&mut RequirementContext<'_>) -> Result<Conclusion, ApiError> + Send + Sync>;

/// Build a requirement from a closure.
pub fn requirement<F>(check: F) -> Requirement
where
    F: Fn(&mut RequirementContext<'_>) -> Result<Conclusion, ApiError> + Send + Sync + 'static,
{
    Arc::new(check)
}

/// What a handler returns.
pub enum Content {
    Data(Value),
    /// A seekable stream; ranges are served from it when its size is known.
    Stream(Box<dyn Readable>),
    /// Re-dispatch the request to another routed function.
    Forward(Endpoint),
    /// Re-dispatch to the function routed under this name for the active version.
    ForwardNamed(String),
}

impl Content {
    pub fn stream(reader: impl Readable + 'static) -> Self {
        Content::Stream(Box::new(reader))
    }

    pub fn forward_named(name: impl Into<String>) -> Self {
        Content::ForwardNamed(name.into())
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Content::Stream(reader) => write!(f, "Stream(size: {:?})", reader.size()),
            Content::Forward(endpoint) => write!(f, "Forward({})", endpoint.name()),
            Content::ForwardNamed(name) => write!(f, "ForwardNamed({name})"),
        }
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Content::Data(value)
    }
}

/// Conversion from a handler's return value.
pub trait IntoContent {
    /// # Errors
    ///
    /// Returns the handler's own error, or a serialization failure.
    fn into_content(self) -> Result<Content, ApiError>;
}

impl IntoContent for Content {
    fn into_content(self) -> Result<Content, ApiError> {
        Ok(self)
    }
}

impl IntoContent for Endpoint {
    fn into_content(self) -> Result<Content, ApiError> {
        Ok(Content::Forward(self))
    }
}

impl<T: IntoContent> IntoContent for Result<T, ApiError> {
    fn into_content(self) -> Result<Content, ApiError> {
        self.and_then(IntoContent::into_content)
    }
}

impl<T: IntoContent> IntoContent for Option<T> {
    fn into_content(self) -> Result<Content, ApiError> {
        self.map_or(Ok(Content::Data(Value::Null)), IntoContent::into_content)
    }
}

impl<T: Serialize> IntoContent for Vec<T> {
    fn into_content(self) -> Result<Content, ApiError> {
        Ok(Content::Data(serde_json::to_value(self)?))
    }
}

macro_rules! into_content_via_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoContent for $ty {
                fn into_content(self) -> Result<Content, ApiError> {
                    Ok(Content::Data(Value::from(self)))
                }
            }
        )*
    };
}

into_content_via_value!(Value, String, &'static str, bool, i32, i64, u32, u64, usize, f64, ());

/// Serialize any value as the handler's result.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoContent for Json<T> {
    fn into_content(self) -> Result<Content, ApiError> {
        Ok(Content::Data(serde_json::to_value(self.0)?))
    }
}

/// The view a handler gets of one invocation.
pub struct Call<'a> {
    params: Map<String, Value>,
    directives: &'a DirectiveValues,
    api: &'a Api,
    api_version: Option<u32>,
    request: Option<&'a mut Request>,
    response: Option<&'a mut Response>,
    context: &'a mut Context,
    exception: Option<&'a ApiError>,
}

impl<'a> Call<'a> {
    /// Deserialize a gathered parameter; a missing one reads as `null`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-data error when the value has the wrong shape.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> Result<T, ApiError> {
        let value = self.params.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|err| ApiError::invalid(format!("Invalid value for '{name}': {err}")))
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    #[must_use]
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// A resource injected by a directive.
    #[must_use]
    pub fn directive<T: Resource + 'static>(&self, name: &str) -> Option<&T> {
        self.directives.resource::<T>(name)
    }

    #[must_use]
    pub fn injected(&self, name: &str) -> Option<&Injected> {
        self.directives.get(name)
    }

    #[must_use]
    pub fn api(&self) -> &Api {
        self.api
    }

    #[must_use]
    pub fn api_version(&self) -> Option<u32> {
        self.api_version
    }

    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        self.request.as_deref()
    }

    /// Mutable access to the request, e.g. to update `context["session"]`
    /// for the session middleware to persist.
    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_deref_mut()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_deref_mut()
    }

    /// The error being handled, when called as an exception handler.
    #[must_use]
    pub fn exception(&self) -> Option<&ApiError> {
        self.exception
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut *self.context
    }
}

/// Per-call references used to resolve directives.
pub(crate) struct Scope<'a> {
    pub api: &'a Api,
    pub request: Option<&'a Request>,
    pub response: Option<&'a Response>,
    pub api_version: Option<u32>,
    pub context: &'a Context,
}

/// How a call failed: an application error that exception handlers may
/// claim, or a framework failure that always propagates.
pub(crate) enum Failure {
    Api(ApiError),
    Fatal(Error),
}

impl From<ApiError> for Failure {
    fn from(err: ApiError) -> Self {
        Failure::Api(err)
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure::Fatal(err)
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Failure::Api(err.into())
    }
}

/// Route-level interface data shared by the HTTP, CLI and local flavours.
pub struct InterfaceCore {
    endpoint: Endpoint,
    parameters: Vec<String>,
    accepted: HashSet<String>,
    defaults: Map<String, Value>,
    required: Vec<String>,
    roles: Vec<(String, ParameterRole)>,
    takes_kwargs: bool,
    var_args: Option<String>,
    transform: Option<Transform>,
    on_invalid: Option<Transform>,
    requires: Vec<Requirement>,
    validate: Option<ValidateFn>,
    raise_on_invalid: bool,
    map_params: Vec<(String, String)>,
    injects_directives: bool,
    doc: Option<String>,
}

impl InterfaceCore {
    pub(crate) fn new(api: &Api, endpoint: &Endpoint, spec: &RouteSpec) -> Self {
        let shared = endpoint.interfaces();
        let parameters = spec
            .parameters
            .clone()
            .unwrap_or_else(|| shared.parameters.clone());
        let defaults = spec
            .defaults
            .clone()
            .unwrap_or_else(|| shared.defaults.clone());

        let mut annotations = shared.annotations.clone();
        for (name, annotation) in spec.args.iter().flatten() {
            match annotations.iter_mut().find(|(existing, _)| existing == name) {
                Some(slot) => slot.1 = annotation.clone(),
                None => annotations.push((name.clone(), annotation.clone())),
            }
        }

        let roles: Vec<(String, ParameterRole)> = parameters
            .iter()
            .map(|name| {
                let annotation = annotations
                    .iter()
                    .find(|(candidate, _)| candidate == name)
                    .map(|(_, annotation)| annotation);
                (name.clone(), role_for(api, name, annotation))
            })
            .collect();

        let required = parameters
            .iter()
            .filter(|name| !defaults.contains_key(name.as_str()))
            .filter(|name| {
                !roles
                    .iter()
                    .any(|(role_name, role)| role_name == *name && matches!(role, ParameterRole::Directive(_)))
            })
            .cloned()
            .collect();

        let transform = spec.transform.resolve(shared.transform.as_ref());
        let on_invalid = spec.on_invalid.resolve(transform.as_ref());

        let mut accepted: HashSet<String> = parameters.iter().cloned().collect();
        accepted.extend(shared.var_args.clone());

        Self {
            endpoint: endpoint.clone(),
            parameters,
            accepted,
            defaults,
            required,
            roles,
            takes_kwargs: shared.takes_kwargs,
            var_args: shared.var_args.clone(),
            transform,
            on_invalid,
            requires: spec.requires.clone().unwrap_or_default(),
            validate: spec.validate.clone(),
            raise_on_invalid: spec.raise_on_invalid.unwrap_or(false),
            map_params: spec.map_params.clone().unwrap_or_default(),
            injects_directives: shared.injects_directives,
            doc: spec.doc.clone().or_else(|| shared.doc.clone()),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.endpoint.name()
    }

    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    #[must_use]
    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Parameters the caller must supply; directives are never required.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    #[must_use]
    pub fn roles(&self) -> &[(String, ParameterRole)] {
        &self.roles
    }

    #[must_use]
    pub fn role(&self, name: &str) -> Option<&ParameterRole> {
        self.roles
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, role)| role)
    }

    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.parameters.iter().any(|parameter| parameter == name)
    }

    #[must_use]
    pub fn var_args(&self) -> Option<&str> {
        self.var_args.as_deref()
    }

    #[must_use]
    pub fn documentation_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    fn directives(&self) -> impl Iterator<Item = (&str, &DirectiveRef)> {
        self.roles.iter().filter_map(|(name, role)| match role {
            ParameterRole::Directive(directive) => Some((name.as_str(), directive)),
            _ => None,
        })
    }

    /// Run requirements in order, stopping at the first denial.
    pub(crate) fn check_requirements(
        &self,
        ctx: &mut RequirementContext<'_>,
    ) -> Result<Option<Value>, ApiError> {
        for requirement in &self.requires {
            if let Conclusion::Deny(value) = requirement(ctx)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Rename externally supplied parameter names.
    pub(crate) fn map_params(&self, params: &mut Map<String, Value>) {
        for (external, internal) in &self.map_params {
            if let Some(value) = params.remove(external) {
                params.insert(internal.clone(), value);
            }
        }
    }

    /// Resolve every directive parameter into `values`. With `overwrite`
    /// unset, directives whose parameter the caller already supplied are
    /// skipped.
    pub(crate) fn resolve_directives(
        &self,
        scope: &Scope<'_>,
        params: &Map<String, Value>,
        overwrite: bool,
        values: &mut DirectiveValues,
    ) -> Result<(), Error> {
        for (name, directive) in self.directives() {
            if !overwrite && params.contains_key(name) {
                continue;
            }
            let ctx = DirectiveContext {
                default: self.defaults.get(name),
                request: scope.request,
                response: scope.response,
                api: scope.api,
                api_version: scope.api_version,
                context: scope.context,
                interface: self.name(),
            };
            let injected = directive.resolve(&ctx).map_err(|source| Error::Directive {
                name: directive.name().to_string(),
                source,
            })?;
            values.insert(name, injected);
        }
        Ok(())
    }

    /// Place resolved directive values into the parameters, unless the
    /// function opted out of injection.
    pub(crate) fn inject(
        &self,
        values: &DirectiveValues,
        params: &mut Map<String, Value>,
        overwrite: bool,
    ) {
        if self.injects_directives {
            values.inject_into(params, overwrite);
        }
    }

    /// Convert typed parameters in place and collect every failure.
    ///
    /// # Errors
    ///
    /// With `raise_on_invalid` set, the first failure is returned as an
    /// invalid-data error instead of being collected.
    pub(crate) fn validate(
        &self,
        params: &mut Map<String, Value>,
        context: &Context,
    ) -> Result<Map<String, Value>, ApiError> {
        let mut errors = Map::new();
        for (name, role) in &self.roles {
            let ParameterRole::Validator(ty) = role else {
                continue;
            };
            let Some(raw) = params.get(name).cloned() else {
                continue;
            };
            match ty.convert(raw, context) {
                Ok(converted) => {
                    params.insert(name.clone(), converted);
                }
                Err(err) if self.raise_on_invalid => {
                    return Err(ApiError::invalid(err.message().to_string())
                        .with_detail(json!({ name.as_str(): err.report() })));
                }
                Err(err) => {
                    errors.insert(name.clone(), err.report());
                }
            }
        }

        for name in &self.required {
            if params.contains_key(name) || errors.contains_key(name) {
                continue;
            }
            if self.raise_on_invalid {
                return Err(ApiError::invalid("Required parameter not supplied")
                    .with_detail(json!({ name.as_str(): "Required parameter not supplied" })));
            }
            errors.insert(name.clone(), Value::from("Required parameter not supplied"));
        }

        if errors.is_empty() {
            if let Some(validate) = &self.validate {
                if let Some(extra) = validate(params) {
                    errors.extend(extra);
                }
            }
        }
        Ok(errors)
    }

    /// Drop unknown keys (unless the function takes arbitrary keyword
    /// arguments) and fill in defaults.
    pub(crate) fn prepare(&self, params: &mut Map<String, Value>) {
        if !self.takes_kwargs {
            params.retain(|key, _| self.accepted.contains(key));
        }
        for (name, default) in &self.defaults {
            if !params.contains_key(name) {
                params.insert(name.clone(), default.clone());
            }
        }
    }

    pub(crate) fn invoke(&self, call: &mut Call<'_>) -> Result<Content, ApiError> {
        self.endpoint.invoke(call)
    }

    pub(crate) fn apply_transform(
        &self,
        value: Value,
        ctx: &TransformContext<'_>,
    ) -> Result<Value, ApiError> {
        match &self.transform {
            Some(transform) => transform.apply(value, ctx),
            None => Ok(value),
        }
    }

    /// `{"errors": errors}`, reshaped by `on_invalid` when one resolves.
    pub(crate) fn invalid_body(
        &self,
        errors: &Map<String, Value>,
        ctx: &TransformContext<'_>,
    ) -> Result<Value, ApiError> {
        let body = json!({ "errors": errors });
        match &self.on_invalid {
            Some(transform) => transform.apply(body, ctx),
            None => Ok(body),
        }
    }

    /// Parameter documentation: usage text plus per-input type docs.
    #[must_use]
    pub fn documentation(&self) -> Value {
        let mut doc = Map::new();
        if let Some(usage) = &self.doc {
            doc.insert("usage".to_string(), Value::from(usage.clone()));
        }
        let mut inputs = Map::new();
        for (name, role) in &self.roles {
            let kind = match role {
                ParameterRole::Directive(_) => continue,
                ParameterRole::Validator(ty) => ty.doc(),
                ParameterRole::Plain => "Basic text / string value".to_string(),
            };
            let mut input = Map::new();
            input.insert("type".to_string(), Value::from(kind));
            if let Some(default) = self.defaults.get(name) {
                input.insert("default".to_string(), default.clone());
            }
            inputs.insert(name.clone(), Value::Object(input));
        }
        if !inputs.is_empty() {
            doc.insert("inputs".to_string(), Value::Object(inputs));
        }
        Value::Object(doc)
    }
}

impl fmt::Debug for InterfaceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceCore")
            .field("name", &self.name())
            .field("roles", &self.roles)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

fn role_for(api: &Api, name: &str, annotation: Option<&Annotation>) -> ParameterRole {
    match annotation {
        Some(Annotation::Directive(directive)) => ParameterRole::Directive(Arc::clone(directive)),
        Some(Annotation::Type(ty)) => ParameterRole::Validator(Arc::clone(ty)),
        Some(Annotation::Schema(schema)) => ParameterRole::Validator(types::schema(Arc::clone(schema))),
        Some(Annotation::Doc(_)) | None => name
            .strip_prefix(DIRECTIVE_PREFIX)
            .and_then(|directive| api.directive(directive))
            .map_or(ParameterRole::Plain, ParameterRole::Directive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives;
    use crate::route::RouteSpec;

    fn greet() -> Endpoint {
        Endpoint::new(
            Signature::new("greet")
                .param("name")
                .optional_with("times", json!(1), types::number())
                .param("with_timer"),
            |call: &mut Call<'_>| -> Result<String, ApiError> {
                let name: String = call.arg("name")?;
                let times: i64 = call.arg("times")?;
                Ok(format!("{name} x{times}"))
            },
        )
    }

    #[test]
    fn test_roles_and_required() {
        let api = Api::new("roles");
        let core = InterfaceCore::new(&api, &greet(), &RouteSpec::default());
        assert_eq!(core.required(), ["name".to_string()]);
        assert!(matches!(core.role("times"), Some(ParameterRole::Validator(_))));
        assert!(matches!(core.role("with_timer"), Some(ParameterRole::Directive(_))));
        assert!(matches!(core.role("name"), Some(ParameterRole::Plain)));
    }

    #[test]
    fn test_annotation_directive_wins() {
        let api = Api::new("roles");
        let endpoint = Endpoint::new(
            Signature::new("f").param_with("with_timer", directives::user()),
            |_call: &mut Call<'_>| (),
        );
        let core = InterfaceCore::new(&api, &endpoint, &RouteSpec::default());
        match core.role("with_timer") {
            Some(ParameterRole::Directive(directive)) => assert_eq!(directive.name(), "user"),
            other => panic!("unexpected role {other:?}"),
        }
    }

    #[test]
    fn test_validate_collects_errors() {
        let api = Api::new("validate");
        let core = InterfaceCore::new(&api, &greet(), &RouteSpec::default());
        let context = Context::default();
        let mut params = Map::new();
        params.insert("times".to_string(), json!("many"));
        let errors = core.validate(&mut params, &context).unwrap();
        assert_eq!(
            Value::Object(errors),
            json!({
                "times": "Invalid whole number provided",
                "name": "Required parameter not supplied",
            })
        );
    }

    #[test]
    fn test_prepare_filters_and_defaults() {
        let api = Api::new("prepare");
        let core = InterfaceCore::new(&api, &greet(), &RouteSpec::default());
        let mut params = Map::new();
        params.insert("name".to_string(), json!("x"));
        params.insert("unexpected".to_string(), json!(true));
        core.prepare(&mut params);
        assert_eq!(Value::Object(params), json!({"name": "x", "times": 1}));
    }

    #[test]
    fn test_parameter_overrides() {
        let api = Api::new("override");
        let spec = RouteSpec {
            parameters: Some(vec!["a".to_string(), "b".to_string()]),
            defaults: Some(serde_json::from_value(json!({"b": 1})).unwrap()),
            ..RouteSpec::default()
        };
        let core = InterfaceCore::new(&api, &greet(), &spec);
        assert_eq!(core.required(), ["a".to_string()]);
    }

    #[test]
    fn test_into_content() {
        assert!(matches!("hi".into_content(), Ok(Content::Data(Value::String(_)))));
        assert!(matches!(None::<i64>.into_content(), Ok(Content::Data(Value::Null))));
        let failed: Result<i64, ApiError> = Err(ApiError::application("boom"));
        assert!(failed.into_content().is_err());
        assert!(matches!(
            Json(vec![1, 2]).into_content(),
            Ok(Content::Data(Value::Array(_)))
        ));
    }
}
