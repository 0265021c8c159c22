use std::time::Duration;

use tracing::info;

use super::Middleware;
use crate::http::{Body, Request, Response};
use crate::ids::REQUEST_ID_HEADER;

/// Logs every request and a combined-log style line for its response, and
/// echoes the request id back as `X-Request-Id`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMiddleware;

impl LogMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn body_length(body: &Body) -> Option<u64> {
    match body {
        Body::Empty => Some(0),
        Body::Bytes(bytes) => u64::try_from(bytes.len()).ok(),
        Body::Stream { length, .. } => *length,
    }
}

impl Middleware for LogMiddleware {
    fn before(&self, req: &mut Request) -> Option<Response> {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            "request"
        );
        None
    }

    fn after(&self, req: &Request, res: &mut Response, latency: Duration) {
        res.set_header(REQUEST_ID_HEADER, req.request_id.to_string());
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            status = res.status.as_u16(),
            length = ?body_length(&res.body),
            latency_ms,
            "response"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echoes_request_id() {
        let mut request = Request::get("/ping");
        let mut response = Response::new();
        assert!(LogMiddleware.before(&mut request).is_none());
        LogMiddleware.after(&request, &mut response, Duration::from_millis(3));
        assert_eq!(
            response.header(REQUEST_ID_HEADER),
            Some(request.request_id.to_string().as_str())
        );
    }
}
