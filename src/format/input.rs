//! Request body decoders.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{decode_text, rekey, underscore};
use crate::error::ApiError;

pub type InputFormatRef = Arc<dyn InputFormat>;

/// Decodes a request body of one MIME type.
pub trait InputFormat: Send + Sync {
    /// # Errors
    ///
    /// Returns a 400-class [`ApiError`] when the body cannot be decoded.
    fn decode(&self, body: &[u8], charset: Option<&str>) -> Result<Value, ApiError>;

    fn doc(&self) -> String;
}

fn invalid_body(description: impl Into<String>) -> ApiError {
    ApiError::bad_request("Invalid body", description)
}

struct Json {
    underscore_keys: bool,
}

impl InputFormat for Json {
    fn decode(&self, body: &[u8], charset: Option<&str>) -> Result<Value, ApiError> {
        let text = decode_text(body, charset).map_err(invalid_body)?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|err| invalid_body(format!("Invalid JSON body: {err}")))?;
        Ok(if self.underscore_keys {
            rekey(value, underscore)
        } else {
            value
        })
    }

    fn doc(&self) -> String {
        if self.underscore_keys {
            "JSON formatted data, with keys converted to underscore style".to_string()
        } else {
            "JSON formatted data".to_string()
        }
    }
}

/// `application/json`.
#[must_use]
pub fn json() -> InputFormatRef {
    Arc::new(Json {
        underscore_keys: false,
    })
}

/// JSON with every object key converted to `under_score` style.
#[must_use]
pub fn json_underscore() -> InputFormatRef {
    Arc::new(Json {
        underscore_keys: true,
    })
}

struct Text;

impl InputFormat for Text {
    fn decode(&self, body: &[u8], charset: Option<&str>) -> Result<Value, ApiError> {
        decode_text(body, charset)
            .map(Value::String)
            .map_err(invalid_body)
    }

    fn doc(&self) -> String {
        "Plain text".to_string()
    }
}

/// Any textual body, decoded to a string.
#[must_use]
pub fn text() -> InputFormatRef {
    Arc::new(Text)
}

struct UrlEncoded;

impl InputFormat for UrlEncoded {
    fn decode(&self, body: &[u8], _charset: Option<&str>) -> Result<Value, ApiError> {
        let mut fields = Map::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            let value = Value::String(value.into_owned());
            match fields.get_mut(key.as_ref()) {
                Some(Value::Array(existing)) => existing.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    fields.insert(key.into_owned(), value);
                }
            }
        }
        Ok(Value::Object(fields))
    }

    fn doc(&self) -> String {
        "URL encoded form fields".to_string()
    }
}

/// `application/x-www-form-urlencoded`.
#[must_use]
pub fn urlencoded() -> InputFormatRef {
    Arc::new(UrlEncoded)
}

/// The formats every API starts with.
#[must_use]
pub fn defaults() -> Vec<(String, InputFormatRef)> {
    vec![
        ("application/json".to_string(), json()),
        ("application/x-www-form-urlencoded".to_string(), urlencoded()),
        ("text/plain".to_string(), text()),
        ("text/css".to_string(), text()),
        ("text/html".to_string(), text()),
    ]
}
