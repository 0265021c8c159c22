use std::time::Duration;

use crate::http::{Request, Response};

/// Request and response hooks run around every HTTP dispatch.
///
/// `before` hooks run in registration order; the first one returning a
/// response short-circuits dispatch. `after` hooks always run, in
/// registration order, including on short-circuited responses.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &mut Request) -> Option<Response> {
        None
    }
    fn after(&self, _req: &Request, _res: &mut Response, _latency: Duration) {}
}
