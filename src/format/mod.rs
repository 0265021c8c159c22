//! # Formats
//!
//! Codecs between HTTP bodies and values:
//!
//! - [`input`]: request body decoders, keyed by MIME type in the API's input
//!   format table. The `charset` parameter of `Content-Type` is honoured.
//! - [`output`]: response serializers, each declaring the content type it
//!   produces. JSON is the default.
//!
//! The helpers at this level parse `Content-Type` values, decode text in the
//! supported charsets, and convert key casing for the underscore/camelCase
//! codecs.

pub mod input;
pub mod output;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)charset=(?P<charset>[^;]+)").expect("valid charset regex"));

/// Split a `Content-Type` value into its lowercased MIME type and charset.
///
/// ```rust
/// use hugroute::format::parse_content_type;
///
/// let (mime, charset) = parse_content_type("Application/JSON; charset=UTF-8");
/// assert_eq!(mime, "application/json");
/// assert_eq!(charset.as_deref(), Some("utf-8"));
/// ```
#[must_use]
pub fn parse_content_type(raw: &str) -> (String, Option<String>) {
    let mime = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let charset = CHARSET
        .captures(raw)
        .and_then(|captures| captures.name("charset"))
        .map(|charset| charset.as_str().trim().trim_matches('"').to_ascii_lowercase());
    (mime, charset)
}

/// Decode `body` as text in `charset` (UTF-8 when absent).
///
/// # Errors
///
/// Returns a description when the charset is unsupported or the bytes are
/// not valid in it.
pub fn decode_text(body: &[u8], charset: Option<&str>) -> Result<String, String> {
    match charset.unwrap_or("utf-8") {
        "utf-8" | "utf8" => String::from_utf8(body.to_vec())
            .map_err(|err| format!("Body is not valid utf-8: {err}")),
        "us-ascii" | "ascii" => {
            if body.is_ascii() {
                Ok(body.iter().map(|&b| char::from(b)).collect())
            } else {
                Err("Body is not valid us-ascii".to_string())
            }
        }
        "iso-8859-1" | "latin-1" | "latin1" => Ok(body.iter().map(|&b| char::from(b)).collect()),
        other => Err(format!("Unsupported charset: {other}")),
    }
}

/// `someKey` and `some-key` to `some_key`.
#[must_use]
pub fn underscore(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for (index, ch) in text.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '-' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// `some_key` to `someKey`.
#[must_use]
pub fn camelcase(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut upper = false;
    for ch in text.chars() {
        if ch == '_' && !out.is_empty() {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rewrite every object key in `value`, recursively.
#[must_use]
pub fn rekey(value: Value, convert: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (convert(&key), rekey(value, convert)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| rekey(item, convert)).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_content_type_without_charset() {
        assert_eq!(parse_content_type("text/plain"), ("text/plain".to_string(), None));
    }

    #[test]
    fn test_decode_text_charsets() {
        assert_eq!(decode_text(b"caf\xe9", Some("iso-8859-1")).unwrap(), "café");
        assert!(decode_text(b"caf\xe9", None).is_err());
        assert_eq!(decode_text("café".as_bytes(), Some("utf-8")).unwrap(), "café");
        assert!(decode_text(b"x", Some("ebcdic")).is_err());
    }

    #[test]
    fn test_key_casing() {
        assert_eq!(underscore("firstName"), "first_name");
        assert_eq!(underscore("content-type"), "content_type");
        assert_eq!(camelcase("first_name"), "firstName");
        assert_eq!(
            rekey(json!({"outerKey": [{"innerKey": 1}]}), underscore),
            json!({"outer_key": [{"inner_key": 1}]})
        );
    }
}
