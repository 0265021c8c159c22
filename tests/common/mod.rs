#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use hugroute::http::{Request, Response};
use hugroute::ApiServer;
use serde_json::Value;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Serve `request` and return the response, failing the test on a
/// framework error.
pub fn send(server: &ApiServer, request: Request) -> Response {
    match server.handle(request) {
        Ok(response) => response,
        Err(err) => panic!("dispatch failed: {err}"),
    }
}

pub fn get(server: &ApiServer, target: &str) -> Response {
    send(server, Request::get(target))
}

pub fn json_body(response: &mut Response) -> Value {
    response.json().expect("response body is json")
}

pub fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

/// Log output captured in memory.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A thread-local subscriber writing plain-text events into memory.
pub struct TestTracing {
    pub logs: CapturedLogs,
    _guard: DefaultGuard,
}

impl TestTracing {
    pub fn init() -> Self {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self {
            logs,
            _guard: guard,
        }
    }
}
