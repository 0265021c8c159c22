//! Redirect helpers.
//!
//! Each helper builds an [`ApiError`] of kind `HTTPRedirect` carrying the
//! status and a `Location` header; return it from a handler with `Err(..)?`
//! and the server renders the redirect with an empty body.

use http::StatusCode;

use crate::error::{kinds, ApiError};

/// Redirect to `location` with an arbitrary status.
#[must_use]
pub fn to(location: &str, status: StatusCode) -> ApiError {
    ApiError::new(&kinds::REDIRECT, status.canonical_reason().unwrap_or("Redirect"))
        .with_status(status)
        .with_header("Location", location)
}

/// 301 Moved Permanently.
#[must_use]
pub fn permanent(location: &str) -> ApiError {
    to(location, StatusCode::MOVED_PERMANENTLY)
}

/// 302 Found.
#[must_use]
pub fn found(location: &str) -> ApiError {
    to(location, StatusCode::FOUND)
}

/// 303 See Other.
#[must_use]
pub fn see_other(location: &str) -> ApiError {
    to(location, StatusCode::SEE_OTHER)
}

/// 307 Temporary Redirect.
#[must_use]
pub fn temporary(location: &str) -> ApiError {
    to(location, StatusCode::TEMPORARY_REDIRECT)
}

/// Signal that the requested resource does not exist; routed to the
/// not-found handler for the active version.
#[must_use]
pub fn not_found() -> ApiError {
    ApiError::not_found()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_statuses() {
        for (err, status) in [
            (permanent("/a"), 301),
            (found("/a"), 302),
            (see_other("/a"), 303),
            (temporary("/a"), 307),
        ] {
            assert_eq!(err.status().map(|s| s.as_u16()), Some(status));
            assert!(err.kind().is_a(&kinds::REDIRECT));
            assert_eq!(err.headers(), [("Location".to_string(), "/a".to_string())]);
        }
    }

    #[test]
    fn test_not_found_signal() {
        assert!(not_found().is_not_found());
    }
}
