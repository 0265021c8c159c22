//! Response serializers.
//!
//! Every formatter declares the content type it produces. Streams returned by
//! a handler pass through every formatter untouched so the serialize step can
//! serve byte ranges from them.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::{camelcase, rekey};
use crate::error::ApiError;
use crate::http::{Body, Readable, Request};
use crate::types::display;

pub type OutputFormatRef = Arc<dyn OutputFormat>;

/// What a handler produced, after transform.
pub enum Payload {
    Data(Value),
    Stream(Box<dyn Readable>),
}

/// A serialized payload. `content_type` overrides the formatter's declared
/// type when the formatter only learns it from the data.
#[derive(Debug)]
pub struct Rendered {
    pub body: Body,
    pub content_type: Option<String>,
}

impl Rendered {
    #[must_use]
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self {
            body: Body::Bytes(bytes),
            content_type: None,
        }
    }

    #[must_use]
    pub fn stream(reader: Box<dyn Readable>) -> Self {
        let length = reader.size();
        Self {
            body: Body::Stream { reader, length },
            content_type: None,
        }
    }
}

/// Serializes payloads into response bodies.
pub trait OutputFormat: Send + Sync {
    /// The content type declared for `request`.
    fn content_type(&self, request: Option<&Request>) -> String;

    /// # Errors
    ///
    /// Returns an [`ApiError`] when the payload cannot be serialized.
    fn format(&self, payload: Payload, request: Option<&Request>) -> Result<Rendered, ApiError>;

    fn doc(&self) -> String;
}

struct Json {
    pretty: bool,
    camel: bool,
}

impl OutputFormat for Json {
    fn content_type(&self, _request: Option<&Request>) -> String {
        "application/json; charset=utf-8".to_string()
    }

    fn format(&self, payload: Payload, _request: Option<&Request>) -> Result<Rendered, ApiError> {
        let value = match payload {
            Payload::Stream(reader) => return Ok(Rendered::stream(reader)),
            Payload::Data(value) if self.camel => rekey(value, camelcase),
            Payload::Data(value) => value,
        };
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&value)?
        } else {
            serde_json::to_vec(&value)?
        };
        Ok(Rendered::bytes(bytes))
    }

    fn doc(&self) -> String {
        match (self.pretty, self.camel) {
            (true, _) => "JSON (Javascript Serialized Object Notation), indented".to_string(),
            (false, true) => "JSON (Javascript Serialized Object Notation) with camelCase keys".to_string(),
            (false, false) => "JSON (Javascript Serialized Object Notation)".to_string(),
        }
    }
}

/// `application/json`. The default output format.
#[must_use]
pub fn json() -> OutputFormatRef {
    Arc::new(Json {
        pretty: false,
        camel: false,
    })
}

#[must_use]
pub fn pretty_json() -> OutputFormatRef {
    Arc::new(Json {
        pretty: true,
        camel: false,
    })
}

/// JSON with object keys converted to camelCase.
#[must_use]
pub fn json_camelcase() -> OutputFormatRef {
    Arc::new(Json {
        pretty: false,
        camel: true,
    })
}

struct Text {
    mime: &'static str,
    doc: &'static str,
}

impl OutputFormat for Text {
    fn content_type(&self, _request: Option<&Request>) -> String {
        format!("{}; charset=utf-8", self.mime)
    }

    fn format(&self, payload: Payload, _request: Option<&Request>) -> Result<Rendered, ApiError> {
        match payload {
            Payload::Stream(reader) => Ok(Rendered::stream(reader)),
            Payload::Data(Value::Null) => Ok(Rendered::bytes(Vec::new())),
            Payload::Data(value) => Ok(Rendered::bytes(display(&value).into_bytes())),
        }
    }

    fn doc(&self) -> String {
        self.doc.to_string()
    }
}

/// `text/plain`; strings are written bare, other values as JSON.
#[must_use]
pub fn text() -> OutputFormatRef {
    Arc::new(Text {
        mime: "text/plain",
        doc: "Free form UTF-8 text",
    })
}

#[must_use]
pub fn html() -> OutputFormatRef {
    Arc::new(Text {
        mime: "text/html",
        doc: "HTML",
    })
}

/// Guess a content type from a file extension.
#[must_use]
pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

struct FileOutput;

impl OutputFormat for FileOutput {
    fn content_type(&self, _request: Option<&Request>) -> String {
        "application/octet-stream".to_string()
    }

    fn format(&self, payload: Payload, _request: Option<&Request>) -> Result<Rendered, ApiError> {
        let path = match payload {
            Payload::Stream(reader) => return Ok(Rendered::stream(reader)),
            Payload::Data(Value::String(path)) => path,
            Payload::Data(_) => return Err(ApiError::not_found()),
        };
        let path = Path::new(&path);
        if !path.is_file() {
            return Err(ApiError::not_found());
        }
        let file = File::open(path)?;
        let mut rendered = Rendered::stream(Box::new(file));
        rendered.content_type = Some(guess_content_type(path).to_string());
        Ok(rendered)
    }

    fn doc(&self) -> String {
        "Any file, served as a stream".to_string()
    }
}

/// Serves the file at the returned path, typed by its extension.
#[must_use]
pub fn file() -> OutputFormatRef {
    Arc::new(FileOutput)
}

struct Negotiate {
    handlers: Vec<(String, OutputFormatRef)>,
    default: OutputFormatRef,
    pick: fn(&Request, &str) -> bool,
    doc: &'static str,
}

impl Negotiate {
    fn choose(&self, request: Option<&Request>) -> &OutputFormatRef {
        request
            .and_then(|request| {
                self.handlers
                    .iter()
                    .find(|(key, _)| (self.pick)(request, key))
                    .map(|(_, handler)| handler)
            })
            .unwrap_or(&self.default)
    }
}

impl OutputFormat for Negotiate {
    fn content_type(&self, request: Option<&Request>) -> String {
        self.choose(request).content_type(request)
    }

    fn format(&self, payload: Payload, request: Option<&Request>) -> Result<Rendered, ApiError> {
        let chosen = self.choose(request);
        let mut rendered = chosen.format(payload, request)?;
        if rendered.content_type.is_none() {
            rendered.content_type = Some(chosen.content_type(request));
        }
        Ok(rendered)
    }

    fn doc(&self) -> String {
        let options: Vec<String> = self
            .handlers
            .iter()
            .map(|(key, handler)| format!("{key}: {}", handler.doc()))
            .collect();
        format!("{} ({})", self.doc, options.join(", "))
    }
}

fn accepts(request: &Request, mime: &str) -> bool {
    request.header("accept").is_some_and(|accept| {
        accept
            .split(',')
            .any(|option| option.split(';').next().unwrap_or_default().trim() == mime)
    })
}

/// Pick a formatter by the request's `Accept` header.
#[must_use]
pub fn accept(handlers: Vec<(String, OutputFormatRef)>, default: OutputFormatRef) -> OutputFormatRef {
    Arc::new(Negotiate {
        handlers,
        default,
        pick: accepts,
        doc: "Supports any of the following formats based on the Accept header",
    })
}

/// Pick a formatter by the request path's suffix.
#[must_use]
pub fn suffix(handlers: Vec<(String, OutputFormatRef)>, default: OutputFormatRef) -> OutputFormatRef {
    Arc::new(Negotiate {
        handlers,
        default,
        pick: |request, suffix| request.path.ends_with(suffix),
        doc: "Supports any of the following formats based on the URL suffix",
    })
}

/// Look up a built-in formatter by its configuration name.
#[must_use]
pub fn by_name(name: &str) -> Option<OutputFormatRef> {
    match name {
        "json" => Some(json()),
        "pretty_json" => Some(pretty_json()),
        "json_camelcase" => Some(json_camelcase()),
        "text" => Some(text()),
        "html" => Some(html()),
        "file" => Some(file()),
        _ => None,
    }
}
