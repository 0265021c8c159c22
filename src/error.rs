//! # Error Module
//!
//! Two layers of failure flow through the dispatch core:
//!
//! - [`ApiError`] is what application code (handlers, requirements, directives,
//!   output formatters) returns. Every `ApiError` carries an [`ErrorKind`], a
//!   statically declared tag with an explicit parent. Exception handlers are
//!   registered against kinds and matched by walking that is-a chain.
//! - [`Error`] is the framework-level failure returned from dispatch when the
//!   request cannot be completed: conflicting version signals, a directive
//!   that failed to resolve, or an application error nothing claimed.
//!
//! ## Declaring kinds
//!
//! ```rust
//! use hugroute::error::{kinds, ErrorKind};
//!
//! static BASE: ErrorKind = ErrorKind::extends("BaseError", &kinds::APPLICATION);
//! static FRIENDLY: ErrorKind = ErrorKind::extends("FriendlyError", &BASE);
//!
//! assert!(FRIENDLY.is_a(&BASE));
//! assert!(!BASE.is_a(&FRIENDLY));
//! assert_eq!(FRIENDLY.distance_to(&BASE), Some(1));
//! ```

use std::fmt;

use http::StatusCode;
use serde_json::{json, Value};

/// A statically declared error tag with an optional parent.
///
/// Kinds form a tree rooted at [`kinds::APPLICATION`]. Two kinds are equal
/// when their names are equal.
#[derive(Debug)]
pub struct ErrorKind {
    name: &'static str,
    parent: Option<&'static ErrorKind>,
}

impl ErrorKind {
    /// Declare a root kind.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// Declare a kind that is-a `parent`.
    #[must_use]
    pub const fn extends(name: &'static str, parent: &'static ErrorKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<&'static ErrorKind> {
        self.parent
    }

    /// Number of parent hops from `self` to `ancestor`, `Some(0)` when equal.
    #[must_use]
    pub fn distance_to(&self, ancestor: &ErrorKind) -> Option<usize> {
        if self == ancestor {
            return Some(0);
        }
        let mut hops = 0;
        let mut current = self.parent;
        while let Some(kind) = current {
            hops += 1;
            if kind == ancestor {
                return Some(hops);
            }
            current = kind.parent;
        }
        None
    }

    /// True when `self` equals `other` or descends from it.
    #[must_use]
    pub fn is_a(&self, other: &ErrorKind) -> bool {
        self.distance_to(other).is_some()
    }

    /// Iterate `self` followed by every ancestor, nearest first.
    pub fn lineage(&'static self) -> impl Iterator<Item = &'static ErrorKind> {
        std::iter::successors(Some(self), |kind| kind.parent)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Kinds the framework itself raises.
pub mod kinds {
    use super::ErrorKind;

    /// Root of every application error.
    pub static APPLICATION: ErrorKind = ErrorKind::new("Exception");
    /// Input that could not be converted when `raise_on_invalid` is set, or a
    /// handler argument that did not deserialize.
    pub static INVALID: ErrorKind = ErrorKind::extends("InvalidTypeData", &APPLICATION);
    pub static IO: ErrorKind = ErrorKind::extends("IOError", &APPLICATION);
    /// Errors rendered by the server as an HTTP status with an error body.
    pub static HTTP_ERROR: ErrorKind = ErrorKind::extends("HTTPError", &APPLICATION);
    /// The not-found signal. Raising it mid-handler routes to the not-found handler.
    pub static NOT_FOUND: ErrorKind = ErrorKind::extends("HTTPNotFound", &HTTP_ERROR);
    pub static BAD_REQUEST: ErrorKind = ErrorKind::extends("HTTPBadRequest", &HTTP_ERROR);
    pub static UNAUTHORIZED: ErrorKind = ErrorKind::extends("HTTPUnauthorized", &HTTP_ERROR);
    /// Non-error statuses (redirects) rendered with headers and an empty body.
    pub static HTTP_STATUS: ErrorKind = ErrorKind::extends("HTTPStatus", &APPLICATION);
    pub static REDIRECT: ErrorKind = ErrorKind::extends("HTTPRedirect", &HTTP_STATUS);
}

/// An application-level error.
///
/// `message` is the short title. `detail` is an optional structured
/// description (for validation errors, the per-field reasons). `status` and
/// `headers` are used when the error is rendered as an HTTP response.
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: &'static ErrorKind,
    message: String,
    detail: Option<Value>,
    status: Option<StatusCode>,
    headers: Vec<(String, String)>,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: &'static ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            status: None,
            headers: Vec::new(),
        }
    }

    /// A plain application error with the root kind.
    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(&kinds::APPLICATION, message)
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(&kinds::INVALID, message)
    }

    /// The not-found signal.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(&kinds::NOT_FOUND, "Not Found").with_status(StatusCode::NOT_FOUND)
    }

    #[must_use]
    pub fn bad_request(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(&kinds::BAD_REQUEST, title)
            .with_status(StatusCode::BAD_REQUEST)
            .with_detail(Value::String(description.into()))
    }

    #[must_use]
    pub fn unauthorized(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(&kinds::UNAUTHORIZED, title)
            .with_status(StatusCode::UNAUTHORIZED)
            .with_detail(Value::String(description.into()))
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn kind(&self) -> &'static ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind.is_a(&kinds::NOT_FOUND)
    }

    /// The body used when this error is rendered by the server:
    /// `{"errors": {title: description}}`.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let description = self
            .detail
            .clone()
            .unwrap_or_else(|| Value::String(self.message.clone()));
        let mut errors = serde_json::Map::new();
        errors.insert(self.message.clone(), description);
        json!({ "errors": errors })
    }

    /// A JSON view handed to exception handlers as the `exception` parameter.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "kind": self.kind.name(),
            "message": self.message,
            "detail": self.detail,
        })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::new(&kinds::IO, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid(err.to_string())
    }
}

/// A framework-level failure surfaced to the caller of dispatch.
#[derive(Debug)]
pub enum Error {
    /// More than one distinct version signal was supplied.
    ConflictingVersions(Vec<String>),
    /// A version signal was not a whole number.
    InvalidVersion(String),
    /// A directive failed to resolve. Directives are trusted, so this is fatal.
    Directive { name: String, source: ApiError },
    /// An application error no exception handler claimed.
    Unhandled(ApiError),
    /// CLI argument parsing or validation failed; `code` is the exit status.
    Cli { message: String, code: i32 },
    /// A route template did not compile.
    InvalidRoute { url: String, source: regex::Error },
    Io(std::io::Error),
}

impl Error {
    /// The application error carried by this failure, if any.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Unhandled(err) => Some(err),
            Error::Directive { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConflictingVersions(versions) => write!(
                f,
                "You are requesting conflicting versions: {}",
                versions.join(", ")
            ),
            Error::InvalidVersion(raw) => write!(f, "Invalid API version requested: {raw}"),
            Error::Directive { name, source } => {
                write!(f, "Directive '{name}' failed to resolve: {source}")
            }
            Error::Unhandled(err) => write!(f, "Unhandled error: {err}"),
            Error::Cli { message, .. } => f.write_str(message),
            Error::InvalidRoute { url, source } => write!(f, "Invalid route template {url}: {source}"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Directive { source, .. } => Some(source),
            Error::Unhandled(err) => Some(err),
            Error::InvalidRoute { source, .. } => Some(source),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Error::Unhandled(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BASE: ErrorKind = ErrorKind::extends("BaseError", &kinds::APPLICATION);
    static FRIENDLY: ErrorKind = ErrorKind::extends("FriendlyError", &BASE);

    #[test]
    fn test_kind_ancestry() {
        assert!(FRIENDLY.is_a(&BASE));
        assert!(FRIENDLY.is_a(&kinds::APPLICATION));
        assert!(!BASE.is_a(&FRIENDLY));
        assert_eq!(FRIENDLY.distance_to(&FRIENDLY), Some(0));
        assert_eq!(FRIENDLY.distance_to(&kinds::APPLICATION), Some(2));
        let names: Vec<_> = FRIENDLY.lineage().map(ErrorKind::name).collect();
        assert_eq!(names, vec!["FriendlyError", "BaseError", "Exception"]);
    }

    #[test]
    fn test_not_found_signal() {
        let err = ApiError::not_found();
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(!ApiError::application("boom").is_not_found());
    }

    #[test]
    fn test_error_body() {
        let err = ApiError::unauthorized("Invalid Authentication", "Provided credentials were invalid");
        assert_eq!(
            err.to_body(),
            json!({"errors": {"Invalid Authentication": "Provided credentials were invalid"}})
        );
    }

    #[test]
    fn test_conflict_display() {
        let err = Error::ConflictingVersions(vec!["3".into(), "4".into()]);
        assert_eq!(err.to_string(), "You are requesting conflicting versions: 3, 4");
    }
}
