use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use super::Middleware;
use crate::http::{Request, Response};
use crate::store::Store;

/// Cookie-backed sessions.
///
/// Before dispatch the session stored under the request's session cookie is
/// loaded into `request.context["session"]` (an empty object when there is
/// none). Afterwards the possibly modified session is written back and the
/// cookie is (re)issued; unknown or missing session ids get a fresh UUID.
pub struct SessionMiddleware {
    store: Arc<dyn Store>,
    context_name: String,
    cookie_name: String,
    cookie_max_age: Option<u64>,
    cookie_domain: Option<String>,
    cookie_path: Option<String>,
    cookie_secure: bool,
    cookie_http_only: bool,
}

impl SessionMiddleware {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            context_name: "session".to_string(),
            cookie_name: "sid".to_string(),
            cookie_max_age: None,
            cookie_domain: None,
            cookie_path: None,
            cookie_secure: true,
            cookie_http_only: true,
        }
    }

    #[must_use]
    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = name.into();
        self
    }

    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn cookie_max_age(mut self, seconds: u64) -> Self {
        self.cookie_max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    fn set_cookie(&self, sid: &str) -> String {
        let mut cookie = format!("{}={sid}", self.cookie_name);
        if let Some(max_age) = self.cookie_max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(domain) = &self.cookie_domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        if let Some(path) = &self.cookie_path {
            cookie.push_str(&format!("; Path={path}"));
        }
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        if self.cookie_http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie
    }
}

impl Middleware for SessionMiddleware {
    fn before(&self, req: &mut Request) -> Option<Response> {
        let data = req
            .cookie(&self.cookie_name)
            .and_then(|sid| self.store.get(&sid))
            .unwrap_or_else(|| Value::Object(Map::new()));
        req.context.insert(self.context_name.clone(), data);
        None
    }

    fn after(&self, req: &Request, res: &mut Response, _latency: Duration) {
        let sid = match req.cookie(&self.cookie_name) {
            Some(sid) if self.store.exists(&sid) => sid,
            _ => {
                let sid = uuid::Uuid::new_v4().to_string();
                debug!(request_id = %req.request_id, "issuing new session");
                sid
            }
        };
        let data = req
            .context
            .get(&self.context_name)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        self.store.set(&sid, data);
        res.append_header("set-cookie", self.set_cookie(&sid));
    }
}

impl std::fmt::Debug for SessionMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMiddleware")
            .field("context_name", &self.context_name)
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}
