use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;

use super::{find_header, HeaderVec};

/// A readable, seekable payload, optionally of known size.
///
/// Streams of known size support `Range` requests.
pub trait Readable: Read + Seek + Send {
    fn size(&self) -> Option<u64> {
        None
    }
}

impl Readable for File {
    fn size(&self) -> Option<u64> {
        self.metadata().ok().map(|meta| meta.len())
    }
}

impl Readable for Cursor<Vec<u8>> {
    fn size(&self) -> Option<u64> {
        u64::try_from(self.get_ref().len()).ok()
    }
}

/// The response payload.
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Stream {
        reader: Box<dyn Readable>,
        length: Option<u64>,
    },
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(bytes) => write!(f, "Body::Bytes({} bytes)", bytes.len()),
            Body::Stream { length, .. } => write!(f, "Body::Stream(length: {length:?})"),
        }
    }
}

/// An outbound HTTP response.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderVec,
    pub content_type: Option<String>,
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderVec::new(),
            content_type: None,
            body: Body::Empty,
        }
    }

    /// Set a header, replacing any existing value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            existing.1 = value;
        } else {
            self.headers.push((Arc::from(name), value));
        }
    }

    /// Add a header, keeping existing values.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.body = Body::Bytes(bytes);
    }

    /// Read the whole body, draining a stream.
    ///
    /// # Errors
    ///
    /// Propagates read errors from a streamed body.
    pub fn take_bytes(&mut self) -> io::Result<Vec<u8>> {
        match std::mem::take(&mut self.body) {
            Body::Empty => Ok(Vec::new()),
            Body::Bytes(bytes) => Ok(bytes),
            Body::Stream { mut reader, .. } => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }

    /// Read the body as text.
    ///
    /// # Errors
    ///
    /// Propagates read errors; invalid UTF-8 is replaced.
    pub fn text(&mut self) -> io::Result<String> {
        self.take_bytes()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the body cannot be read or is not JSON.
    pub fn json(&mut self) -> io::Result<Value> {
        let bytes = self.take_bytes()?;
        serde_json::from_slice(&bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_header_replaces() {
        let mut response = Response::new();
        response.set_header("Cache-Control", "public");
        response.set_header("cache-control", "private");
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.header("CACHE-CONTROL"), Some("private"));
        response.append_header("Vary", "Accept");
        response.append_header("Vary", "Origin");
        assert_eq!(response.headers.len(), 3);
    }

    #[test]
    fn test_body_readers() {
        let mut response = Response::new();
        response.body = Body::Stream {
            reader: Box::new(Cursor::new(b"{\"ok\":true}".to_vec())),
            length: Some(11),
        };
        assert_eq!(response.json().unwrap(), json!({"ok": true}));
        assert!(matches!(response.body, Body::Empty));
    }
}
