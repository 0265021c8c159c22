//! End-to-end tests over a real socket.

mod common;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use common::TestTracing;
use hugroute::config::RuntimeConfig;
use hugroute::introspect::Signature;
use hugroute::route::{self, Router};
use hugroute::server::{self, ServerHandle};
use hugroute::{types, Api, ApiError, Call, Endpoint};
use serde_json::{json, Value};

/// Serves a small API on a free port and stops it on drop.
struct TestServer {
    _tracing: TestTracing,
    handle: Option<ServerHandle>,
    addr: SocketAddr,
}

impl TestServer {
    fn start() -> Self {
        let tracing = TestTracing::init();
        let mut api = Api::new("wire");
        let double = Endpoint::new(
            Signature::new("double").param_with("value", types::number()),
            |call: &mut Call<'_>| -> Result<i64, ApiError> { Ok(call.arg::<i64>("value")? * 2) },
        );
        route::get().versions([1]).route(&mut api, &double);
        let server = api.server().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let runtime = RuntimeConfig { stack_size: 0x8000 };
        let handle = server::serve(server, &addr.to_string(), runtime).unwrap();
        handle.wait_ready().unwrap();
        Self {
            _tracing: tracing,
            handle: Some(handle),
            addr,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

fn send_request(addr: &SocketAddr, req: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(req.as_bytes()).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut buf = Vec::new();
    loop {
        let mut tmp = [0u8; 1024];
        match stream.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                break
            }
            Err(e) => panic!("read error: {e:?}"),
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Status, headers (lower-cased names) and JSON body.
fn parse_response(resp: &str) -> (u16, Vec<(String, String)>, Value) {
    let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    (status, headers, serde_json::from_str(body).unwrap_or(Value::Null))
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(candidate, _)| candidate == name)
        .map(|(_, value)| value.as_str())
}

#[test]
fn test_request_round_trip() {
    let server = TestServer::start();
    let resp = send_request(
        &server.addr,
        "GET /v1/double?value=21 HTTP/1.1\r\nHost: localhost\r\nX-Request-Id: 01ARZ3NDEKTSV4RRFFQ69G5FAV\r\n\r\n",
    );
    let (status, headers, body) = parse_response(&resp);
    assert_eq!(status, 200);
    assert_eq!(body, json!(42));
    assert!(header(&headers, "content-type").is_some_and(|value| value.starts_with("application/json")));
}

#[test]
fn test_validation_errors_over_the_wire() {
    let server = TestServer::start();
    let resp = send_request(&server.addr, "GET /v1/double?value=x HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let (status, _, body) = parse_response(&resp);
    assert_eq!(status, 400);
    assert_eq!(body, json!({"errors": {"value": "Invalid whole number provided"}}));
}

#[test]
fn test_version_conflict_is_bad_request() {
    let server = TestServer::start();
    let resp = send_request(
        &server.addr,
        "GET /v1/double?value=1&api_version=2 HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, _, body) = parse_response(&resp);
    assert_eq!(status, 400);
    assert!(body["errors"]["Invalid API version"].is_string());
}

#[test]
fn test_unknown_path_is_not_found() {
    let server = TestServer::start();
    let resp = send_request(&server.addr, "GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n");
    let (status, _, body) = parse_response(&resp);
    assert_eq!(status, 404);
    assert!(body.get("404").is_some());
}
