//! Version resolution.
//!
//! A request can ask for a version three ways: a `/v{N}` path prefix, a
//! version header and a version query parameter. Any that are present must
//! agree; none at all selects the unversioned routes.

use tracing::warn;

use crate::error::Error;
use crate::http::Request;

pub const DEFAULT_VERSION_HEADER: &str = "X-API-VERSION";
pub const DEFAULT_VERSION_PARAM: &str = "api_version";

fn parse(raw: &str) -> Result<u32, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidVersion(raw.to_string()))
}

/// Resolve the version `request` asks for.
///
/// `from_path` is the version taken from a `/v{N}` prefix, when the router
/// found one.
///
/// # Errors
///
/// [`Error::InvalidVersion`] when a header or parameter value is not a whole
/// number, [`Error::ConflictingVersions`] when the signals disagree.
pub fn determine_version(
    request: &Request,
    from_path: Option<u32>,
    header: &str,
    param: &str,
) -> Result<Option<u32>, Error> {
    let mut candidates: Vec<u32> = Vec::with_capacity(3);
    candidates.extend(from_path);
    if let Some(raw) = request.header(header) {
        candidates.push(parse(raw)?);
    }
    if let Some(raw) = request.query_param(param) {
        candidates.push(parse(raw)?);
    }
    candidates.sort_unstable();
    candidates.dedup();
    match candidates.as_slice() {
        [] => Ok(None),
        [version] => Ok(Some(*version)),
        conflicting => {
            let requested: Vec<String> = conflicting.iter().map(u32::to_string).collect();
            warn!(path = %request.path, versions = ?requested, "conflicting versions requested");
            Err(Error::ConflictingVersions(requested))
        }
    }
}
