//! Development HTTP server.
//!
//! Serves an [`ApiServer`] over `may_minihttp`: wire requests are converted
//! into [`crate::http::Request`]s, dispatched, and the resulting
//! [`crate::http::Response`] is written back. Streamed bodies are buffered.

mod http_server;

pub use http_server::{HttpServer, ServerHandle};

use std::io::{self, Read};
use std::sync::Arc;

use http::{Method, StatusCode};
use may_minihttp::HttpService;
use serde_json::json;
use tracing::{error, warn};

use crate::api::ApiServer;
use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::http::{Body, HeaderVec, Request, Response};
use crate::ids::{RequestId, REQUEST_ID_HEADER};

/// `may_minihttp` service dispatching into an [`ApiServer`].
#[derive(Clone)]
pub struct ApiService {
    server: Arc<ApiServer>,
}

impl ApiService {
    #[must_use]
    pub fn new(server: ApiServer) -> Self {
        Self {
            server: Arc::new(server),
        }
    }
}

/// Convert a wire request. The body is read to the end.
fn to_request(req: may_minihttp::Request) -> io::Result<Request> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let target = req.path().to_string();
    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|header| {
            (
                Arc::from(header.name),
                String::from_utf8_lossy(header.value).into_owned(),
            )
        })
        .collect();

    let mut request = Request::new(method, &target);
    request.request_id =
        RequestId::from_header_or_new(crate::http::find_header(&headers, REQUEST_ID_HEADER));
    request.headers = headers;
    let mut body = Vec::new();
    req.body().read_to_end(&mut body)?;
    request.body = body;
    Ok(request)
}

/// `may_minihttp` only accepts `'static` header lines.
fn static_line(name: &str, value: &str) -> &'static str {
    Box::leak(format!("{name}: {value}").into_boxed_str())
}

fn write_response(mut response: Response, res: &mut may_minihttp::Response) -> io::Result<()> {
    let status = response.status;
    res.status_code(
        usize::from(status.as_u16()),
        status.canonical_reason().unwrap_or("Unknown"),
    );
    if let Some(content_type) = &response.content_type {
        res.header(static_line("Content-Type", content_type));
    }
    for (name, value) in &response.headers {
        if name.eq_ignore_ascii_case("content-type") || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        res.header(static_line(name, value));
    }
    match std::mem::take(&mut response.body) {
        Body::Empty => {}
        Body::Bytes(bytes) => res.body_vec(bytes),
        Body::Stream { mut reader, .. } => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            res.body_vec(bytes);
        }
    }
    Ok(())
}

/// Framework failures that escaped dispatch.
fn failure_response(err: &Error) -> Response {
    let mut response = Response::new();
    let (status, title) = match err {
        Error::ConflictingVersions(_) | Error::InvalidVersion(_) => {
            (StatusCode::BAD_REQUEST, "Invalid API version")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
    };
    response.status = status;
    response.content_type = Some("application/json; charset=utf-8".to_string());
    response.set_bytes(json!({ "errors": { title: err.to_string() } }).to_string().into_bytes());
    response
}

impl HttpService for ApiService {
    fn call(&mut self, req: may_minihttp::Request, res: &mut may_minihttp::Response) -> io::Result<()> {
        let request = match to_request(req) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "rejecting unreadable request");
                let mut response = Response::new();
                response.status = StatusCode::BAD_REQUEST;
                return write_response(response, res);
            }
        };
        let (method, path) = (request.method.clone(), request.path.clone());
        let response = match self.server.handle(request) {
            Ok(response) => response,
            Err(err) => {
                error!(method = %method, path = %path, error = %err, "request failed");
                failure_response(&err)
            }
        };
        write_response(response, res)
    }
}

/// Configure the coroutine runtime and serve `server` on `addr`.
///
/// # Errors
///
/// Unresolvable addresses and bind failures.
pub fn serve(server: ApiServer, addr: &str, runtime: RuntimeConfig) -> io::Result<ServerHandle> {
    may::config().set_stack_size(runtime.stack_size);
    HttpServer(ApiService::new(server)).start(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_response() {
        let mut response = failure_response(&Error::ConflictingVersions(vec!["1".into(), "2".into()]));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        let body = response.json().unwrap();
        assert!(body["errors"]["Invalid API version"].is_string());

        let response = failure_response(&Error::Io(io::Error::other("disk")));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
