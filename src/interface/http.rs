//! The HTTP interface: one routed function served over HTTP.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{Call, Content, Endpoint, Failure, InterfaceCore, RequirementContext, Scope};
use crate::api::Api;
use crate::context::{Context, InterfaceKind, Outcome};
use crate::directives::DirectiveValues;
use crate::error::{ApiError, Error};
use crate::format::input::InputFormatRef;
use crate::format::output::{OutputFormatRef, Payload};
use crate::format::parse_content_type;
use crate::http::{Body, RangeError, Readable, Request, Response};
use crate::route::RouteSpec;
use crate::transform::TransformContext;

/// Where an HTTP interface is registered. Only plain routes and sinks hand
/// their failures to the not-found and exception handlers; handlers never
/// catch their own errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceRole {
    Route,
    Sink,
    NotFound,
    Exception,
}

/// A function routed over HTTP.
pub struct HttpInterface {
    core: InterfaceCore,
    role: InterfaceRole,
    output: Option<OutputFormatRef>,
    output_invalid: Option<OutputFormatRef>,
    inputs: Vec<(String, InputFormatRef)>,
    status: Option<StatusCode>,
    response_headers: Vec<(String, String)>,
    parse_body: bool,
    examples: Vec<String>,
    private: bool,
}

enum Finish {
    Completed,
    Invalid(Map<String, Value>),
    Lacking(Value),
}

impl HttpInterface {
    #[must_use]
    pub fn new(api: &Api, endpoint: &Endpoint, spec: &RouteSpec, role: InterfaceRole) -> Self {
        let core = InterfaceCore::new(api, endpoint, spec);
        let examples = match &spec.examples {
            Some(examples) => examples.clone(),
            None if core.required().is_empty() => vec![String::new()],
            None => Vec::new(),
        };
        Self {
            core,
            role,
            output: spec.output.clone(),
            output_invalid: spec.output_invalid.clone(),
            inputs: spec.inputs.clone().unwrap_or_default(),
            status: spec.status,
            response_headers: spec.response_headers.clone().unwrap_or_default(),
            parse_body: spec.parse_body.unwrap_or(true),
            examples,
            private: spec.private.unwrap_or(false),
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

    #[must_use]
    pub fn role(&self) -> InterfaceRole {
        self.role
    }

    #[must_use]
    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// The route's formatter, else the API default.
    #[must_use]
    pub fn output(&self, api: &Api) -> OutputFormatRef {
        self.output
            .as_ref()
            .map_or_else(|| api.http.output_format(), Arc::clone)
    }

    /// Serve `request` into `response`.
    ///
    /// `extra` holds parameters captured by the router (URL template values);
    /// they have the lowest precedence.
    ///
    /// # Errors
    ///
    /// Fails on directive errors and on application errors no handler claims.
    pub fn call(
        &self,
        api: &Api,
        request: &mut Request,
        response: &mut Response,
        api_version: Option<u32>,
        extra: Map<String, Value>,
    ) -> Result<(), Error> {
        self.dispatch(api, request, response, api_version, extra, None)
    }

    pub(crate) fn dispatch(
        &self,
        api: &Api,
        request: &mut Request,
        response: &mut Response,
        api_version: Option<u32>,
        extra: Map<String, Value>,
        exception: Option<&ApiError>,
    ) -> Result<(), Error> {
        let mut context = api.create_context(InterfaceKind::Http, self.name(), api_version);
        let mut directives = DirectiveValues::default();
        let result = self.run(
            api,
            request,
            response,
            api_version,
            extra,
            exception,
            &mut context,
            &mut directives,
        );
        match result {
            Ok(finish) => {
                directives.cleanup(None);
                let outcome = match &finish {
                    Finish::Completed => Outcome::Completed,
                    Finish::Invalid(errors) => Outcome::Invalid(errors),
                    Finish::Lacking(denied) => Outcome::Lacking(denied),
                };
                api.delete_context(context, &outcome);
                Ok(())
            }
            Err(Failure::Api(err)) => {
                directives.cleanup(Some(&err));
                api.delete_context(context, &Outcome::Failed(&err));
                self.handle_error(api, request, response, api_version, err)
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

    fn handle_error(
        &self,
        api: &Api,
        request: &mut Request,
        response: &mut Response,
        api_version: Option<u32>,
        err: ApiError,
    ) -> Result<(), Error> {
        if !matches!(self.role, InterfaceRole::Route | InterfaceRole::Sink) {
            return Err(Error::Unhandled(err));
        }
        if err.is_not_found() {
            debug!(interface = self.name(), "handler raised not found");
            *response = Response::new();
            return api.not_found(request, response, api_version);
        }
        match api.http.exception_handler(&err, api_version) {
            Some(handler) => {
                debug!(
                    interface = self.name(),
                    kind = err.kind().name(),
                    handler = handler.name(),
                    "dispatching to exception handler"
                );
                *response = Response::new();
                handler.dispatch(api, request, response, api_version, Map::new(), Some(&err))
            }
            None => {
                warn!(interface = self.name(), error = %err, "unhandled application error");
                Err(Error::Unhandled(err))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        api: &Api,
        request: &mut Request,
        response: &mut Response,
        api_version: Option<u32>,
        extra: Map<String, Value>,
        exception: Option<&ApiError>,
        context: &mut Context,
        directives: &mut DirectiveValues,
    ) -> Result<Finish, Failure> {
        let output = self.output(api);
        self.set_response_defaults(request, response, &output);

        let denied = self.core.check_requirements(&mut RequirementContext {
            request: Some(&mut *request),
            response: Some(&mut *response),
            context: &*context,
            api_version,
        })?;
        if let Some(denied) = denied {
            debug!(interface = self.name(), "requirement denied the request");
            render(request, response, Payload::Data(denied.clone()), &output)?;
            return Ok(Finish::Lacking(denied));
        }

        let mut params = self.gather(api, request, extra)?;
        let scope = Scope {
            api,
            request: Some(&*request),
            response: Some(&*response),
            api_version,
            context: &*context,
        };
        self.core
            .resolve_directives(&scope, &params, true, directives)?;
        self.core.inject(directives, &mut params, true);
        if self.core.declares("api_version") {
            params.insert("api_version".to_string(), json!(api_version));
        }

        let errors = self.core.validate(&mut params, context)?;
        if !errors.is_empty() {
            debug!(interface = self.name(), errors = %Value::Object(errors.clone()), "invalid input");
            let ctx = TransformContext {
                request: Some(&*request),
                context: &*context,
            };
            let body = self.core.invalid_body(&errors, &ctx)?;
            let invalid_output = self
                .output_invalid
                .as_ref()
                .map_or_else(|| Arc::clone(&output), Arc::clone);
            response.status = StatusCode::BAD_REQUEST;
            response.content_type = Some(invalid_output.content_type(Some(request)));
            render(request, response, Payload::Data(body), &invalid_output)?;
            return Ok(Finish::Invalid(errors));
        }

        self.core.prepare(&mut params);
        let content = {
            let mut call = Call {
                params,
                directives: &*directives,
                api,
                api_version,
                request: Some(&mut *request),
                response: Some(&mut *response),
                context: &mut *context,
                exception,
            };
            self.core.invoke(&mut call)?
        };

        let value = match content {
            Content::Data(value) => value,
            // Streams are not values; transforms only apply to data.
            Content::Stream(reader) => {
                render(request, response, Payload::Stream(reader), &output)?;
                return Ok(Finish::Completed);
            }
            Content::Forward(endpoint) => {
                let target = forward_target(api, &endpoint, api_version);
                debug!(from = self.name(), to = target.name(), "forwarding request");
                target.call(api, request, response, None, Map::new())?;
                return Ok(Finish::Completed);
            }
            Content::ForwardNamed(name) => {
                let target = api
                    .http
                    .function(api_version, &name)
                    .ok_or_else(ApiError::not_found)?;
                debug!(from = self.name(), to = target.name(), "forwarding request");
                target.call(api, request, response, None, Map::new())?;
                return Ok(Finish::Completed);
            }
        };

        let ctx = TransformContext {
            request: Some(&*request),
            context: &*context,
        };
        let value = self.core.apply_transform(value, &ctx)?;
        render(request, response, Payload::Data(value), &output)?;
        Ok(Finish::Completed)
    }

    fn set_response_defaults(
        &self,
        request: &Request,
        response: &mut Response,
        output: &OutputFormatRef,
    ) {
        for (name, value) in &self.response_headers {
            response.set_header(name, value.clone());
        }
        response.status = self.status.unwrap_or(StatusCode::OK);
        response.content_type = Some(output.content_type(Some(request)));
    }

    /// Path values, then query, then body.
    fn gather(
        &self,
        api: &Api,
        request: &Request,
        extra: Map<String, Value>,
    ) -> Result<Map<String, Value>, ApiError> {
        let mut params = extra;
        params.extend(request.params());
        let mut body = None;
        if self.parse_body && !request.body.is_empty() {
            body = self.decode_body(api, request)?;
            if let Some(Value::Object(fields)) = &body {
                params.extend(fields.clone());
            }
        }
        // A declared `body` is always supplied, null when the request had none.
        if self.core.declares("body") {
            params.insert("body".to_string(), body.unwrap_or(Value::Null));
        }
        self.core.map_params(&mut params);
        Ok(params)
    }

    fn decode_body(&self, api: &Api, request: &Request) -> Result<Option<Value>, ApiError> {
        let Some(raw) = request.content_type() else {
            return Ok(None);
        };
        let (mime, charset) = parse_content_type(raw);
        let format = self
            .inputs
            .iter()
            .find(|(candidate, _)| *candidate == mime)
            .map(|(_, format)| Arc::clone(format))
            .or_else(|| api.http.input_format(&mime));
        match format {
            Some(format) => format.decode(&request.body, charset.as_deref()).map(Some),
            None => Ok(None),
        }
    }

    /// Method-level documentation.
    #[must_use]
    pub fn documentation(&self, api: &Api) -> Value {
        let mut doc = match self.core.documentation() {
            Value::Object(doc) => doc,
            _ => Map::new(),
        };
        let output = self.output(api);
        doc.insert(
            "outputs".to_string(),
            json!({
                "format": output.doc(),
                "content_type": output.content_type(None),
            }),
        );
        Value::Object(doc)
    }
}

impl std::fmt::Debug for HttpInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInterface")
            .field("core", &self.core)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// The interface a forwarded endpoint runs through: its route for the active
/// version, else its unversioned route, else a default route built on the spot.
fn forward_target(api: &Api, endpoint: &Endpoint, api_version: Option<u32>) -> Arc<HttpInterface> {
    api.http
        .routed(endpoint, api_version)
        .unwrap_or_else(|| {
            Arc::new(HttpInterface::new(
                api,
                endpoint,
                &RouteSpec::default(),
                InterfaceRole::Route,
            ))
        })
}

fn render(
    request: &Request,
    response: &mut Response,
    payload: Payload,
    output: &OutputFormatRef,
) -> Result<(), ApiError> {
    let rendered = output.format(payload, Some(request))?;
    if let Some(content_type) = rendered.content_type {
        response.content_type = Some(content_type);
    }
    match rendered.body {
        Body::Stream {
            reader,
            length: Some(size),
        } => serve_stream(request, response, reader, size),
        body => {
            response.body = body;
            Ok(())
        }
    }
}

/// Serve a stream of known size, honouring a `Range` header.
fn serve_stream(
    request: &Request,
    response: &mut Response,
    mut reader: Box<dyn Readable>,
    size: u64,
) -> Result<(), ApiError> {
    response.set_header("Accept-Ranges", "bytes");
    let Some(range) = request.range() else {
        response.body = Body::Stream {
            reader,
            length: Some(size),
        };
        return Ok(());
    };
    match range.resolve(size) {
        Ok(range) => {
            let len = usize::try_from(range.len())
                .map_err(|_| ApiError::application("Requested range is too large"))?;
            reader.seek(SeekFrom::Start(range.start))?;
            let mut chunk = vec![0u8; len];
            reader.read_exact(&mut chunk)?;
            response.status = StatusCode::PARTIAL_CONTENT;
            response.set_header("Content-Range", range.content_range(size));
            response.body = Body::Bytes(chunk);
        }
        Err(RangeError::NotSatisfiable { .. }) => {
            response.status = StatusCode::RANGE_NOT_SATISFIABLE;
            response.set_header("Content-Range", format!("bytes */{size}"));
            response.body = Body::Empty;
        }
        Err(_) => {
            response.body = Body::Stream {
                reader,
                length: Some(size),
            };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::Signature;
    use crate::transform::Transform;
    use crate::types;
    use std::io::Cursor;

    fn serve(api: &Api, interface: &HttpInterface, mut request: Request) -> Response {
        let mut response = Response::new();
        interface
            .call(api, &mut request, &mut response, None, Map::new())
            .unwrap();
        response
    }

    #[test]
    fn test_body_merges_into_params() {
        let api = Api::new("body");
        let endpoint = Endpoint::new(
            Signature::new("sum").param_with("a", types::number()).param_with("b", types::number()),
            |call: &mut Call<'_>| -> Result<i64, ApiError> {
                Ok(call.arg::<i64>("a")? + call.arg::<i64>("b")?)
            },
        );
        let interface = HttpInterface::new(&api, &endpoint, &RouteSpec::default(), InterfaceRole::Route);
        let request = Request::post("/sum?a=1").with_json(&json!({"b": 2}));
        let mut response = serve(&api, &interface, request);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json().unwrap(), json!(3));
    }

    #[test]
    fn test_undecodable_body_is_bad_request() {
        let api = Api::new("body");
        let endpoint = Endpoint::new(Signature::new("echo").param("body"), |call: &mut Call<'_>| {
            call.param("body").cloned().unwrap_or(Value::Null)
        });
        let interface = HttpInterface::new(&api, &endpoint, &RouteSpec::default(), InterfaceRole::Route);
        let mut request = Request::post("/echo").with_body("application/json", "{nope");
        let mut response = Response::new();
        let err = interface
            .call(&api, &mut request, &mut response, None, Map::new())
            .unwrap_err();
        assert_eq!(err.api_error().and_then(ApiError::status), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_range_request() {
        let api = Api::new("range");
        let endpoint = Endpoint::new(Signature::new("blob"), |_call: &mut Call<'_>| {
            Content::stream(Cursor::new(b"0123456789".to_vec()))
        });
        let interface = HttpInterface::new(&api, &endpoint, &RouteSpec::default(), InterfaceRole::Route);
        let mut response = serve(&api, &interface, Request::get("/blob").with_header("Range", "bytes=2-5"));
        assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.header("content-range"), Some("bytes 2-5/10"));
        assert_eq!(response.text().unwrap(), "2345");

        let mut whole = serve(&api, &interface, Request::get("/blob"));
        assert_eq!(whole.status, StatusCode::OK);
        assert_eq!(whole.text().unwrap(), "0123456789");

        let beyond = serve(&api, &interface, Request::get("/blob").with_header("Range", "bytes=50-"));
        assert_eq!(beyond.status, StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[test]
    fn test_streams_bypass_route_transform() {
        let api = Api::new("transforms");
        let spec = RouteSpec {
            transform: crate::interface::Override::Use(Transform::map(|_| json!("transformed"))),
            ..RouteSpec::default()
        };
        let blob = Endpoint::new(Signature::new("blob"), |_call: &mut Call<'_>| {
            Content::stream(Cursor::new(b"raw bytes".to_vec()))
        });
        let interface = HttpInterface::new(&api, &blob, &spec, InterfaceRole::Route);
        let mut streamed = serve(&api, &interface, Request::get("/blob"));
        assert_eq!(streamed.text().unwrap(), "raw bytes");

        let data = Endpoint::new(Signature::new("data"), |_call: &mut Call<'_>| "raw");
        let interface = HttpInterface::new(&api, &data, &spec, InterfaceRole::Route);
        let mut transformed = serve(&api, &interface, Request::get("/data"));
        assert_eq!(transformed.json().unwrap(), json!("transformed"));
    }

    #[test]
    fn test_trivial_example_for_parameterless_routes() {
        let api = Api::new("examples");
        let endpoint = Endpoint::new(Signature::new("ping"), |_call: &mut Call<'_>| "pong");
        let interface = HttpInterface::new(&api, &endpoint, &RouteSpec::default(), InterfaceRole::Route);
        assert_eq!(interface.examples(), [String::new()]);
    }
}
