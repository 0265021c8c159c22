//! Authentication requirements.
//!
//! Each builder returns a [`Requirement`] to attach to routes with
//! `Router::requires`. A verifier maps the presented credentials to a user
//! value, or `None` when they are rejected. On success the user is stored in
//! `request.context["user"]`, where the `user` directive finds it.
//!
//! Missing credentials fail with 401 `Authentication Required`; rejected or
//! malformed ones with 401 `Invalid Authentication`.

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::interface::{requirement, Conclusion, Requirement, RequirementContext};

pub const API_KEY_HEADER: &str = "X-Api-Key";

type Challenge = Option<&'static str>;

fn missing(kind: &str, challenge: Challenge) -> ApiError {
    challenged(
        ApiError::unauthorized(
            "Authentication Required",
            format!("Please provide valid {kind} credentials"),
        ),
        challenge,
    )
}

fn rejected(kind: &str, challenge: Challenge) -> ApiError {
    challenged(
        ApiError::unauthorized(
            "Invalid Authentication",
            format!("Provided {kind} credentials were invalid"),
        ),
        challenge,
    )
}

fn challenged(err: ApiError, challenge: Challenge) -> ApiError {
    match challenge {
        Some(challenge) => err.with_header("WWW-Authenticate", challenge),
        None => err,
    }
}

/// Verify the credentials carried by `header` and store the user.
fn authenticator<E, V>(
    kind: &'static str,
    header: &'static str,
    challenge: Challenge,
    extract: E,
    verify: V,
) -> Requirement
where
    E: Fn(&str) -> Result<Vec<String>, ()> + Send + Sync + 'static,
    V: Fn(&[String]) -> Option<Value> + Send + Sync + 'static,
{
    requirement(move |ctx: &mut RequirementContext<'_>| {
        let Some(request) = ctx.request.as_deref_mut() else {
            return Ok(Conclusion::Pass);
        };
        let Some(raw) = request.header(header).map(str::to_string) else {
            debug!(kind, "authentication required");
            return Err(missing(kind, challenge));
        };
        let credentials = extract(&raw).map_err(|()| {
            challenged(
                ApiError::unauthorized("Invalid Authentication", "Authentication header improperly formed"),
                challenge,
            )
        })?;
        match verify(&credentials) {
            Some(user) => {
                request.context.insert("user".to_string(), user);
                Ok(Conclusion::Pass)
            }
            None => {
                debug!(kind, "authentication rejected");
                Err(rejected(kind, challenge))
            }
        }
    })
}

/// HTTP basic authentication. `verify` receives the user name and password.
pub fn basic<F>(verify: F) -> Requirement
where
    F: Fn(&str, &str) -> Option<Value> + Send + Sync + 'static,
{
    authenticator(
        "Basic",
        "Authorization",
        Some("Basic realm=simple"),
        |raw| {
            let (scheme, encoded) = raw.trim().split_once(' ').ok_or(())?;
            if !scheme.eq_ignore_ascii_case("basic") {
                return Err(());
            }
            let decoded = general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|_| ())?;
            let decoded = String::from_utf8(decoded).map_err(|_| ())?;
            let (user, password) = decoded.split_once(':').ok_or(())?;
            Ok(vec![user.to_string(), password.to_string()])
        },
        move |credentials| match credentials {
            [user, password] => verify(user, password),
            _ => None,
        },
    )
}

/// API key passed in the `X-Api-Key` header.
pub fn api_key<F>(verify: F) -> Requirement
where
    F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
{
    authenticator(
        "API Key",
        API_KEY_HEADER,
        None,
        |raw| Ok(vec![raw.to_string()]),
        move |credentials| credentials.first().and_then(|key| verify(key)),
    )
}

/// Opaque token passed as the whole `Authorization` header.
pub fn token<F>(verify: F) -> Requirement
where
    F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
{
    authenticator(
        "Token",
        "Authorization",
        None,
        |raw| Ok(vec![raw.to_string()]),
        move |credentials| credentials.first().and_then(|token| verify(token)),
    )
}

/// A basic-auth verifier accepting exactly one user name and password; the
/// user value is the name.
#[must_use]
pub fn verify(user: &str, password: &str) -> Arc<dyn Fn(&str, &str) -> Option<Value> + Send + Sync> {
    let (user, password) = (user.to_string(), password.to_string());
    Arc::new(move |name, secret| (name == user && secret == password).then(|| Value::String(name.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, InterfaceKind};
    use crate::http::Request;
    use serde_json::json;

    fn run(check: &Requirement, request: &mut Request) -> Result<Conclusion, ApiError> {
        let context = Context::new(InterfaceKind::Http, "test", None);
        check(&mut RequirementContext {
            request: Some(request),
            response: None,
            context: &context,
            api_version: None,
        })
    }

    fn basic_header(user: &str, password: &str) -> String {
        format!("Basic {}", general_purpose::STANDARD.encode(format!("{user}:{password}")))
    }

    #[test]
    fn test_basic() {
        let checker = verify("ada", "secret");
        let check = basic(move |user, password| checker(user, password));

        let mut request = Request::get("/").with_header("Authorization", &basic_header("ada", "secret"));
        assert_eq!(run(&check, &mut request).unwrap(), Conclusion::Pass);
        assert_eq!(request.context.get("user"), Some(&json!("ada")));

        let mut request = Request::get("/").with_header("Authorization", &basic_header("ada", "wrong"));
        let err = run(&check, &mut request).unwrap_err();
        assert_eq!(err.message(), "Invalid Authentication");
        assert_eq!(err.status(), Some(http::StatusCode::UNAUTHORIZED));

        let err = run(&check, &mut Request::get("/")).unwrap_err();
        assert_eq!(err.message(), "Authentication Required");
        assert!(err
            .headers()
            .iter()
            .any(|(name, value)| name == "WWW-Authenticate" && value == "Basic realm=simple"));
    }

    #[test]
    fn test_malformed_basic_header() {
        let check = basic(|_, _| Some(json!("anyone")));
        let mut request = Request::get("/").with_header("Authorization", "Bearer abc");
        let err = run(&check, &mut request).unwrap_err();
        assert_eq!(err.detail(), Some(&json!("Authentication header improperly formed")));
    }

    #[test]
    fn test_api_key_and_token() {
        let key = api_key(|key| (key == "k1").then(|| json!({"name": "bot"})));
        let mut request = Request::get("/").with_header("X-Api-Key", "k1");
        assert_eq!(run(&key, &mut request).unwrap(), Conclusion::Pass);
        assert_eq!(request.context.get("user"), Some(&json!({"name": "bot"})));

        let tok = token(|token| (token == "t1").then(|| json!("svc")));
        let mut request = Request::get("/").with_header("Authorization", "t2");
        assert_eq!(run(&tok, &mut request).unwrap_err().message(), "Invalid Authentication");
    }
}
