//! The local interface: call a routed function directly from Rust.

use std::io::Read;

use serde_json::{Map, Value};
use tracing::debug;

use super::{Call, Content, Endpoint, Failure, InterfaceCore, RequirementContext, Scope};
use crate::api::Api;
use crate::context::{Context, InterfaceKind, Outcome};
use crate::directives::DirectiveValues;
use crate::error::{ApiError, Error};
use crate::format::output::{OutputFormatRef, Payload};
use crate::http::Body;
use crate::route::RouteSpec;
use crate::transform::TransformContext;

/// A function exposed for direct calls.
///
/// Unlike the HTTP interface, caller-supplied values always win over
/// directive injection, and validation failures are returned as the call's
/// value (`{"errors": ...}`) unless `raise_on_invalid` is set.
pub struct LocalInterface {
    core: InterfaceCore,
    output: Option<OutputFormatRef>,
    skip_directives: bool,
    skip_validation: bool,
    version: Option<u32>,
}

impl LocalInterface {
    #[must_use]
    pub fn new(api: &Api, endpoint: &Endpoint, spec: &RouteSpec) -> Self {
        let version = spec
            .versions
            .as_ref()
            .and_then(|versions| versions.iter().flatten().max().copied());
        Self {
            core: InterfaceCore::new(api, endpoint, spec),
            output: spec.output.clone(),
            skip_directives: spec.skip_directives.unwrap_or(false),
            skip_validation: spec.skip_validation.unwrap_or(false),
            version,
        }
    }

    #[must_use]
    pub fn core(&self) -> &InterfaceCore {
        &self.core
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Call the function. Positional `args` fill the declared parameters in
    /// order; any overflow goes to the variadic parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unhandled`] for application errors (including
    /// validation failures when `raise_on_invalid` is set) and
    /// [`Error::Directive`] when a directive fails.
    pub fn call(&self, api: &Api, args: Vec<Value>, kwargs: Map<String, Value>) -> Result<Value, Error> {
        api.start();
        let params = self.bind(args, kwargs)?;
        let mut context = api.create_context(InterfaceKind::Local, self.name(), self.version);
        let mut directives = DirectiveValues::default();
        let result = self.execute(api, params, &mut context, &mut directives);
        match result {
            Ok((value, invalid)) => {
                directives.cleanup(None);
                match &invalid {
                    Some(errors) => api.delete_context(context, &Outcome::Invalid(errors)),
                    None => api.delete_context(context, &Outcome::Completed),
                }
                self.format(value)
            }
            Err(Failure::Api(err)) => {
                directives.cleanup(Some(&err));
                api.delete_context(context, &Outcome::Failed(&err));
                Err(Error::Unhandled(err))
            }
            Err(Failure::Fatal(fatal)) => {
                let err = fatal
                    .api_error()
                    .cloned()
                    .unwrap_or_else(|| ApiError::application(fatal.to_string()));
                directives.cleanup(Some(&err));
                api.delete_context(context, &Outcome::Failed(&err));
                Err(fatal)
            }
        }
    }

    fn bind(&self, args: Vec<Value>, mut kwargs: Map<String, Value>) -> Result<Map<String, Value>, ApiError> {
        let positional: Vec<&String> = self
            .core
            .parameters()
            .iter()
            .filter(|name| self.core.var_args() != Some(name.as_str()))
            .collect();
        let mut args = args.into_iter();
        for name in &positional {
            let Some(value) = args.next() else { break };
            if kwargs.contains_key(name.as_str()) {
                return Err(ApiError::invalid(format!(
                    "{}() got multiple values for argument '{name}'",
                    self.name()
                )));
            }
            kwargs.insert((*name).clone(), value);
        }
        let rest: Vec<Value> = args.collect();
        match self.core.var_args() {
            Some(var_args) => {
                kwargs.insert(var_args.to_string(), Value::Array(rest));
            }
            None if !rest.is_empty() => {
                return Err(ApiError::invalid(format!(
                    "{}() takes {} positional arguments but {} were given",
                    self.name(),
                    positional.len(),
                    positional.len() + rest.len()
                )));
            }
            None => {}
        }
        Ok(kwargs)
    }

    fn execute(
        &self,
        api: &Api,
        mut params: Map<String, Value>,
        context: &mut Context,
        directives: &mut DirectiveValues,
    ) -> Result<(Value, Option<Map<String, Value>>), Failure> {
        let denied = self.core.check_requirements(&mut RequirementContext {
            request: None,
            response: None,
            context: &*context,
            api_version: self.version,
        })?;
        if let Some(denied) = denied {
            debug!(interface = self.name(), "requirement denied the call");
            return Ok((denied, None));
        }

        if !self.skip_directives {
            let scope = Scope {
                api,
                request: None,
                response: None,
                api_version: self.version,
                context: &*context,
            };
            self.core
                .resolve_directives(&scope, &params, false, directives)?;
            self.core.inject(directives, &mut params, false);
        }

        if !self.skip_validation {
            let errors = self.core.validate(&mut params, context)?;
            if !errors.is_empty() {
                let ctx = TransformContext {
                    request: None,
                    context: &*context,
                };
                let body = self.core.invalid_body(&errors, &ctx)?;
                return Ok((body, Some(errors)));
            }
        }

        self.core.prepare(&mut params);
        let content = {
            let mut call = Call {
                params,
                directives: &*directives,
                api,
                api_version: self.version,
                request: None,
                response: None,
                context: &mut *context,
                exception: None,
            };
            self.core.invoke(&mut call)?
        };
        let value = match content {
            Content::Data(value) => value,
            Content::Stream(mut reader) => {
                let mut text = String::new();
                reader.read_to_string(&mut text)?;
                Value::String(text)
            }
            Content::Forward(_) | Content::ForwardNamed(_) => {
                return Err(Failure::Api(ApiError::application(
                    "Forwarding is only supported over HTTP",
                )))
            }
        };
        let ctx = TransformContext {
            request: None,
            context: &*context,
        };
        Ok((self.core.apply_transform(value, &ctx)?, None))
    }

    /// Serialize through the configured output format into a string value.
    fn format(&self, value: Value) -> Result<Value, Error> {
        let Some(output) = &self.output else {
            return Ok(value);
        };
        let rendered = output
            .format(Payload::Data(value), None)
            .map_err(Error::Unhandled)?;
        let bytes = match rendered.body {
            Body::Bytes(bytes) => bytes,
            Body::Stream { mut reader, .. } => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                bytes
            }
            Body::Empty => Vec::new(),
        };
        Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl std::fmt::Debug for LocalInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalInterface")
            .field("core", &self.core)
            .field("skip_directives", &self.skip_directives)
            .field("skip_validation", &self.skip_validation)
            .finish_non_exhaustive()
    }
}
