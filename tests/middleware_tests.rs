mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{get, json_body, send, TestTracing};
use http::{Method, StatusCode};
use hugroute::http::{Request, Response};
use hugroute::ids::REQUEST_ID_HEADER;
use hugroute::introspect::Signature;
use hugroute::middleware::{CorsMiddleware, LogMiddleware, Middleware, SessionMiddleware};
use hugroute::route::{self, Router};
use hugroute::store::{InMemoryStore, Store};
use hugroute::{Api, ApiServer, Call, Endpoint};
use serde_json::{json, Value};

fn visit() -> Endpoint {
    Endpoint::new(Signature::new("visit").param("with_session"), |call: &mut Call<'_>| {
        let visits = call
            .param("with_session")
            .and_then(|session| session.get("visits"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
            + 1;
        if let Some(request) = call.request_mut() {
            request
                .context
                .insert("session".to_string(), json!({"visits": visits}));
        }
        visits
    })
}

fn session_server(store: &Arc<InMemoryStore>) -> ApiServer {
    let mut api = Api::new("sessions");
    let store: Arc<dyn Store> = Arc::clone(store) as Arc<dyn Store>;
    api.http.add_middleware(Arc::new(
        SessionMiddleware::new(store)
            .cookie_secure(false)
            .cookie_path("/"),
    ));
    route::get().route(&mut api, &visit());
    api.server().unwrap()
}

fn session_id(response: &Response) -> String {
    let cookie = response.header("set-cookie").expect("session cookie issued");
    assert!(cookie.ends_with("; Path=/; HttpOnly"), "{cookie}");
    let (pair, _) = cookie.split_once(';').unwrap();
    pair.strip_prefix("sid=").unwrap().to_string()
}

#[test]
fn test_session_survives_requests() {
    let store = Arc::new(InMemoryStore::new());
    let server = session_server(&store);

    let mut first = get(&server, "/visit");
    assert_eq!(json_body(&mut first), json!(1));
    let sid = session_id(&first);
    assert_eq!(store.get(&sid), Some(json!({"visits": 1})));

    let cookie = format!("sid={sid}");
    let mut second = send(&server, Request::get("/visit").with_header("Cookie", &cookie));
    assert_eq!(json_body(&mut second), json!(2));
    assert_eq!(session_id(&second), sid);
    assert_eq!(store.get(&sid), Some(json!({"visits": 2})));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_unknown_session_gets_fresh_id() {
    let store = Arc::new(InMemoryStore::new());
    let server = session_server(&store);

    let response = send(&server, Request::get("/visit").with_header("Cookie", "sid=forged"));
    let sid = session_id(&response);
    assert_ne!(sid, "forged");
    assert!(store.exists(&sid));
    assert!(!store.exists("forged"));
}

fn cors_server() -> ApiServer {
    let mut api = Api::new("cors");
    api.http.add_middleware(Arc::new(
        CorsMiddleware::new(vec!["https://app.example".to_string()])
            .allowed_headers(vec!["content-type".to_string()])
            .max_age(600),
    ));
    let ping = Endpoint::new(Signature::new("ping"), |_call: &mut Call<'_>| "pong");
    route::get().route(&mut api, &ping);
    api.server().unwrap()
}

#[test]
fn test_cors_headers_for_allowed_origin() {
    let server = cors_server();
    let request = Request::get("/ping").with_header("Origin", "https://app.example");
    let response = send(&server, request);
    assert_eq!(
        response.header("Access-Control-Allow-Origin"),
        Some("https://app.example")
    );

    let stranger = send(&server, Request::get("/ping").with_header("Origin", "https://evil.example"));
    assert_eq!(stranger.header("Access-Control-Allow-Origin"), None);
}

#[test]
fn test_cors_preflight() {
    let server = cors_server();
    let request = Request::new(Method::OPTIONS, "/ping").with_header("Origin", "https://app.example");
    let response = send(&server, request);
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.header("Access-Control-Allow-Methods"), Some("GET"));
    assert_eq!(response.header("Access-Control-Allow-Headers"), Some("content-type"));
    assert_eq!(response.header("Access-Control-Max-Age"), Some("600"));
}

#[test]
fn test_log_middleware_records_requests() {
    let tracing = TestTracing::init();
    let mut api = Api::new("logged");
    api.http.add_middleware(Arc::new(LogMiddleware::new()));
    let ping = Endpoint::new(Signature::new("ping"), |_call: &mut Call<'_>| "pong");
    route::get().route(&mut api, &ping);
    let server = api.server().unwrap();

    let response = get(&server, "/ping");
    assert!(response.header(REQUEST_ID_HEADER).is_some());

    let logs = tracing.logs.contents();
    assert!(logs.contains("request"), "{logs}");
    assert!(logs.contains("path=/ping"), "{logs}");
    assert!(logs.contains("status=200"), "{logs}");
}

/// Answers every request itself.
struct Maintenance;

impl Middleware for Maintenance {
    fn before(&self, _req: &mut Request) -> Option<Response> {
        let mut response = Response::new();
        response.status = StatusCode::SERVICE_UNAVAILABLE;
        response.set_bytes(b"down for maintenance".to_vec());
        Some(response)
    }
}

#[derive(Default)]
struct Counting {
    before: AtomicUsize,
    after: AtomicUsize,
}

impl Middleware for Counting {
    fn before(&self, _req: &mut Request) -> Option<Response> {
        self.before.fetch_add(1, Ordering::SeqCst);
        None
    }

    fn after(&self, _req: &Request, _res: &mut Response, _latency: Duration) {
        self.after.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_before_hook_short_circuits() {
    let counting = Arc::new(Counting::default());
    let mut api = Api::new("maintenance");
    api.http.add_middleware(Arc::new(Maintenance));
    api.http.add_middleware(Arc::clone(&counting) as Arc<dyn Middleware>);
    let ping = Endpoint::new(Signature::new("ping"), |_call: &mut Call<'_>| "pong");
    route::get().route(&mut api, &ping);
    let server = api.server().unwrap();

    let mut response = get(&server, "/ping");
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().unwrap(), "down for maintenance");
    assert_eq!(counting.before.load(Ordering::SeqCst), 0);
    assert_eq!(counting.after.load(Ordering::SeqCst), 1);
}
